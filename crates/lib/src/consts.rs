/// Application name, used for directories under the XDG base paths.
pub const APP_NAME: &str = "pinenv";

/// Default configuration file name.
pub const CONFIG_FILENAME: &str = "pinenv.json";

/// Environment variable overriding the package store root.
pub const STORE_ENV_VAR: &str = "PINENV_STORE";

/// Length of the truncated object hash used in store paths.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Upper bound on overlay fixpoint passes before the fold is declared divergent.
pub const MAX_OVERLAY_PASSES: usize = 16;
