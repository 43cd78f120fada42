pub mod path_validator;

pub use path_validator::{is_name_valid, validate_hostname, validate_key_name, validate_profile_name};
