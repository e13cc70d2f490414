//! Default names and values shared across the provider.

pub const PROVIDER_TYPE_NAME: &str = "doom";
pub const SESSION_TYPE_SUFFIX: &str = "_session";

/// Flag that precedes the WAD file on the launch command line.
pub const IWAD_FLAG: &str = "-iwad";

pub const DEV_VERSION: &str = "dev";

pub const STATE_DIR_NAME: &str = "doom-provider";
pub const STATE_FILE_NAME: &str = "terraform.tfstate.json";
pub const STATE_FORMAT_VERSION: u32 = 1;

pub const DEFAULT_ADDRESS: &str = "main";

pub fn session_type_name(provider_type_name: &str) -> String {
    format!("{}{}", provider_type_name, SESSION_TYPE_SUFFIX)
}
