//! pve-lxc create - Create an LXC container

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use pve_lxc_core::{Config, CreateRequest, create_container};
use serde_json::json;

use super::{Globals, ParamFile};
use crate::output::{CommandSpinner, Reported, print_result};

#[derive(Args, Debug, Default)]
pub struct CreateArgs {
    /// Container hostname
    #[arg(short, long)]
    pub name: Option<String>,

    /// Container ID (default: next free ID from the cluster)
    #[arg(long)]
    pub ctid: Option<u32>,

    /// CPU cores
    #[arg(short, long)]
    pub cores: Option<u32>,

    /// Memory in MB
    #[arg(short, long)]
    pub memory: Option<u32>,

    /// Root disk size in GB
    #[arg(short, long)]
    pub disk: Option<u32>,

    /// IP address or range to pick a free address from (21-50, 192.168.1.100/24)
    #[arg(long)]
    pub ip: Option<String>,

    /// Gateway (default: the PVE host's gateway)
    #[arg(short, long)]
    pub gateway: Option<String>,

    /// Template name prefix or full volume ID
    #[arg(short, long)]
    pub template: Option<String>,

    /// Storage for the root filesystem
    #[arg(short, long)]
    pub storage: Option<String>,

    /// Pass the host GPU through to the container
    #[arg(long)]
    pub gpu: bool,

    /// Download the template with pveam if the storage lacks it
    #[arg(long)]
    pub download_template: bool,

    /// YAML file with parameters; flags take precedence
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,
}

/// Merge flags over the parameter file
fn build_request(args: &CreateArgs, params: &ParamFile) -> Result<CreateRequest> {
    let Some(name) = args.name.clone().or_else(|| params.string("name")) else {
        bail!("Container name is required (--name or 'name' in the parameter file)");
    };

    Ok(CreateRequest {
        name,
        ctid: args.ctid.or(params.u32("ctid")?),
        cores: args.cores.or(params.u32("cores")?),
        memory: args.memory.or(params.u32("memory")?),
        disk: args.disk.or(params.u32("disk")?),
        ip: args.ip.clone().or_else(|| params.string("ip")),
        gateway: args.gateway.clone().or_else(|| params.string("gateway")),
        template: args.template.clone().or_else(|| params.string("template")),
        storage: args.storage.clone().or_else(|| params.string("storage")),
        gpu: args.gpu || params.bool("gpu").unwrap_or(false),
        download_template: args.download_template
            || params.bool("download_template").unwrap_or(false),
    })
}

pub fn cmd_create(args: &CreateArgs, globals: &Globals, config: &Config) -> Result<()> {
    let params = ParamFile::load(args.config.as_deref())?;
    let request = build_request(args, &params)?;
    let pve = globals.connect()?;

    let spinner = CommandSpinner::new_maybe(
        &format!("Creating container {}...", request.name),
        globals.silent(),
    );

    let result = match create_container(&pve, config, &request) {
        Ok(result) => result,
        Err(e) => {
            spinner.fail("Create failed");
            return Err(e.into());
        }
    };

    if globals.json {
        if result.success {
            print_result(true, json!({ "ctid": result.ctid, "ip": result.ip }));
        } else {
            print_result(false, json!({ "ctid": result.ctid, "message": result.message }));
        }
    } else if result.success {
        spinner.success(&result.message);
        if globals.quiet {
            if let Some(ctid) = result.ctid {
                println!("{ctid}");
            }
        } else {
            if let Some(ctid) = result.ctid {
                println!("  {:<8} {}", style("CTID:").dim(), style(ctid).cyan());
            }
            println!(
                "  {:<8} {}",
                style("IP:").dim(),
                result.ip.as_deref().unwrap_or("dhcp")
            );
        }
    } else {
        spinner.fail(&result.message);
        if globals.quiet {
            eprintln!("{}", result.message);
        } else if result.message.starts_with("Template") && !request.download_template {
            println!(
                "  {} Re-run with {} to fetch it",
                style("Tip:").cyan(),
                style("--download-template").bold()
            );
        }
    }

    if result.success {
        Ok(())
    } else {
        Err(Reported.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_win_over_parameter_file() {
        let params = ParamFile::from_yaml("name: from-file\ncores: 4\nmemory: 1024\nip: 21-50\n");
        let args = CreateArgs {
            cores: Some(8),
            ip: Some("192.168.1.77".to_string()),
            ..CreateArgs::default()
        };

        let request = build_request(&args, &params).unwrap();
        assert_eq!(request.name, "from-file");
        assert_eq!(request.cores, Some(8));
        assert_eq!(request.memory, Some(1024));
        assert_eq!(request.ip.as_deref(), Some("192.168.1.77"));
        assert_eq!(request.disk, None);
    }

    #[test]
    fn name_is_required() {
        let err = build_request(&CreateArgs::default(), &ParamFile::default()).unwrap_err();
        assert!(err.to_string().contains("name is required"));
    }

    #[test]
    fn gpu_from_file_or_flag() {
        let args = CreateArgs {
            name: Some("gpu-box".to_string()),
            ..CreateArgs::default()
        };
        let from_file = build_request(&args, &ParamFile::from_yaml("gpu: true\n")).unwrap();
        assert!(from_file.gpu);

        let args = CreateArgs {
            gpu: true,
            ..args
        };
        assert!(build_request(&args, &ParamFile::default()).unwrap().gpu);
    }

    #[test]
    fn download_template_from_file_or_flag() {
        let args = CreateArgs {
            name: Some("web".to_string()),
            ..CreateArgs::default()
        };
        assert!(!build_request(&args, &ParamFile::default()).unwrap().download_template);
        let params = ParamFile::from_yaml("download_template: true\n");
        assert!(build_request(&args, &params).unwrap().download_template);

        let args = CreateArgs {
            download_template: true,
            ..args
        };
        assert!(build_request(&args, &ParamFile::default()).unwrap().download_template);
    }

    #[test]
    fn bad_number_in_file_is_reported() {
        let args = CreateArgs {
            name: Some("web".to_string()),
            ..CreateArgs::default()
        };
        let params = ParamFile::from_yaml("memory: lots\n");
        assert!(build_request(&args, &params).is_err());
    }
}
