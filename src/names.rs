//! `kbsync names`: print every derived resource name.
//!
//! Needs no credentials; useful for checking what a suffix maps to before
//! creating anything.

use crate::config::Config;

pub fn run_names(config: &Config) {
    let names = config.names();
    println!("{:<24} NAME", "RESOURCE");
    for (label, name) in names.entries() {
        println!("{:<24} {}", label, name);
    }
}
