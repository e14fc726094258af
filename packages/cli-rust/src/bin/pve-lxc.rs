//! pve-lxc binary entry point

fn main() {
    if let Err(e) = pve_lxc::run() {
        eprintln!("{} {:#}", console::style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}
