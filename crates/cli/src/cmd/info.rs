use anyhow::Result;

use pinenv_lib::config::find_config_path;
use pinenv_lib::consts::CONFIG_FILENAME;
use pinenv_lib::platform::{Platform, paths};

use crate::output::{print_info, print_stat, print_warning};

pub fn cmd_info() -> Result<()> {
  println!("System:");
  match Platform::current() {
    Some(platform) => print_stat("Platform", &platform.to_string()),
    None => print_warning("Could not detect platform."),
  }

  let supported: Vec<String> = Platform::supported().iter().map(Platform::triple).collect();
  print_stat("Supported", &supported.join(", "));
  print_stat("Store", &paths::store_dir().display().to_string());

  match find_config_path(None) {
    Ok(path) => print_stat("Config", &path.display().to_string()),
    Err(_) => print_info(&format!("No config found; run from a directory with {CONFIG_FILENAME}")),
  }

  Ok(())
}
