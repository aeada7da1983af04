pub mod locale;
pub mod password;
