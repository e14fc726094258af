//! pve-lxc deploy - Install an application into a container

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use console::style;
use pve_lxc_core::apps::{AppInstaller, AppRegistry, INSTALL_STEPS, InstallResult};
use pve_lxc_core::config::merge;
use pve_lxc_core::validation::{validate_ctid, validate_name};
use pve_lxc_core::{Config, CreateRequest, Pve, create_container, deploy_app, wait_for_ready};
use serde_json::json;
use serde_yaml::{Mapping, Value};

use super::{Globals, ParamFile};
use crate::output::{CommandSpinner, Reported, print_result, step_prefix};

#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Application to install (see `pve-lxc apps`)
    pub app: String,

    /// Existing container to install into
    #[arg(short, long, alias = "container")]
    pub ctid: Option<u32>,

    /// Create a new container sized for the application first
    #[arg(long)]
    pub create: bool,

    /// Name of the new container (default: the application name)
    #[arg(short, long, requires = "create")]
    pub name: Option<String>,

    /// CPU cores for the new container
    #[arg(long, requires = "create")]
    pub cores: Option<u32>,

    /// Memory in MB for the new container
    #[arg(long, requires = "create")]
    pub memory: Option<u32>,

    /// Disk size in GB for the new container
    #[arg(long, requires = "create")]
    pub disk: Option<u32>,

    /// IP address or range for the new container
    #[arg(long, requires = "create")]
    pub ip: Option<String>,

    /// Application parameter as KEY=VALUE (repeatable)
    #[arg(short, long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// YAML file with application parameters
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,
}

/// `KEY=VALUE` with the value read as a YAML scalar (`16`, `true`, `text`)
fn parse_param(pair: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = pair.split_once('=') else {
        bail!("Invalid parameter '{pair}', expected KEY=VALUE");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid parameter '{pair}', key is empty");
    }
    let value = match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        _ => Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

/// Config `apps.<app>` section, then the parameter file, then `--param`
fn build_params(config: &Config, app: &str, file: ParamFile, pairs: &[String]) -> Result<Value> {
    let mut flags = Mapping::new();
    for pair in pairs {
        let (key, value) = parse_param(pair)?;
        flags.insert(Value::String(key), value);
    }

    let base = config
        .app_params(app)
        .cloned()
        .unwrap_or_else(|| Value::Mapping(Mapping::new()));
    Ok(merge(&[base, file.into_value(), Value::Mapping(flags)]))
}

pub fn cmd_deploy(args: &DeployArgs, globals: &Globals, config: &Config) -> Result<()> {
    let registry = AppRegistry::new();
    let Some(installer) = registry.get(&args.app) else {
        bail!(
            "Application '{}' not found. Available: {}",
            args.app,
            registry.list_all().join(", ")
        );
    };

    if let Some(ctid) = args.ctid {
        validate_ctid(ctid)?;
    }
    if let Some(name) = &args.name {
        validate_name(name)?;
    }
    if !args.create && args.ctid.is_none() {
        bail!("Specify --ctid or use --create");
    }

    let file = ParamFile::load(args.config.as_deref())?;
    let params = build_params(config, &args.app, file, &args.params)?;
    let pve = globals.connect()?;

    let spinner = CommandSpinner::new_maybe(
        &format!("Deploying {}...", installer.name()),
        globals.silent(),
    );
    deploy_on(&pve, args, installer, params, globals, config, spinner)
}

/// Optional create, then the install; the spinner is failed on every error
fn deploy_on(
    pve: &Pve,
    args: &DeployArgs,
    installer: &dyn AppInstaller,
    params: Value,
    globals: &Globals,
    config: &Config,
    spinner: CommandSpinner,
) -> Result<()> {
    let ctid = match args.ctid.filter(|_| !args.create) {
        Some(ctid) => ctid,
        None => {
            let request = CreateRequest {
                name: args.name.clone().unwrap_or_else(|| args.app.clone()),
                ctid: args.ctid,
                cores: Some(args.cores.unwrap_or(installer.default_cores())),
                memory: Some(args.memory.unwrap_or(installer.default_memory())),
                disk: Some(args.disk.unwrap_or(installer.default_disk())),
                ip: args.ip.clone(),
                ..CreateRequest::default()
            };
            spinner.update(&format!("Creating container {}...", request.name));
            let created = match create_container(pve, config, &request) {
                Ok(created) => created,
                Err(e) => {
                    spinner.fail("Create failed");
                    return Err(e.into());
                }
            };
            if !created.success {
                let message = format!("Failed to create container: {}", created.message);
                spinner.fail(&message);
                if globals.json {
                    print_result(false, json!({ "app": args.app, "message": message }));
                    return Err(Reported.into());
                }
                bail!(message);
            }
            let ctid = created
                .ctid
                .ok_or_else(|| anyhow!("Container was created without an ID"))?;
            spinner.println(&format!("{} Container {ctid} created", style("\u{2713}").green()));

            spinner.update(&format!("Waiting for container {ctid}..."));
            if let Err(e) = wait_for_ready(
                pve,
                ctid,
                config.deploy.ready_attempts,
                Duration::from_secs(config.deploy.ready_interval_secs),
            ) {
                spinner.fail(&format!("Container {ctid} did not become ready"));
                return Err(e.into());
            }
            ctid
        }
    };

    let outcome = deploy_app(pve, ctid, installer, params, |current, step| {
        spinner.update(&format!(
            "{} {} {}",
            step_prefix(current, INSTALL_STEPS.len()),
            installer.name(),
            step
        ));
    });
    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            spinner.fail("Deploy failed");
            return Err(e).with_context(|| format!("Deploying {} into container {ctid}", args.app));
        }
    };

    report(&result, ctid, &args.app, globals, spinner)
}

fn report(
    result: &InstallResult,
    ctid: u32,
    app: &str,
    globals: &Globals,
    spinner: CommandSpinner,
) -> Result<()> {
    if globals.json {
        if result.success {
            print_result(
                true,
                json!({
                    "ctid": ctid,
                    "app": app,
                    "access_url": result.access_url,
                    "credentials": result.credentials,
                }),
            );
            return Ok(());
        }
        print_result(false, json!({ "ctid": ctid, "app": app, "message": result.message }));
        return Err(Reported.into());
    }

    if !result.success {
        spinner.fail(&result.message);
        if globals.quiet {
            eprintln!("{}", result.message);
        }
        return Err(Reported.into());
    }

    spinner.success(&format!("{app} installed in container {ctid}"));
    if globals.quiet {
        return Ok(());
    }
    if let Some(url) = &result.access_url {
        println!("  {:<12} {}", style("URL:").dim(), style(url).cyan());
    }
    if let Some(credentials) = &result.credentials {
        println!("  {}", style("Credentials:").dim());
        for (key, value) in credentials {
            println!("    {key}: {value}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pve_lxc_core::{CommandExecutor, CommandResult, ExecError};
    use std::path::Path;

    #[test]
    fn param_values_are_typed() {
        assert_eq!(
            parse_param("version=16").unwrap(),
            ("version".to_string(), serde_yaml::from_str("16").unwrap())
        );
        assert_eq!(
            parse_param("compose=true").unwrap().1,
            Value::Bool(true)
        );
        assert_eq!(
            parse_param("password=s3cr=t").unwrap().1,
            Value::String("s3cr=t".to_string())
        );
    }

    #[test]
    fn param_without_equals_is_rejected() {
        assert!(parse_param("version").is_err());
        assert!(parse_param("=16").is_err());
    }

    #[test]
    fn flags_override_file_and_config() {
        let config: Config =
            serde_yaml::from_str("apps:\n  postgres:\n    version: 15\n    db: app\n").unwrap();
        let file = ParamFile::from_yaml("version: 16\nuser: admin\n");
        let params = build_params(
            &config,
            "postgres",
            file,
            &["user=postgres".to_string()],
        )
        .unwrap();

        assert_eq!(params["version"].as_u64(), Some(16));
        assert_eq!(params["db"].as_str(), Some("app"));
        assert_eq!(params["user"].as_str(), Some("postgres"));
    }

    /// Host that refuses every command
    struct Offline;

    impl CommandExecutor for Offline {
        fn run(&self, _cmd: &[String], _check: bool) -> Result<CommandResult, ExecError> {
            Err(offline())
        }

        fn push_file(&self, _local: &Path, _remote: &Path) -> Result<bool, ExecError> {
            Err(offline())
        }

        fn read_file(&self, _remote: &Path) -> Result<String, ExecError> {
            Err(offline())
        }

        fn close(&self) {}

        fn is_local(&self) -> bool {
            false
        }

        fn describe(&self) -> String {
            "offline".to_string()
        }
    }

    fn offline() -> ExecError {
        ExecError::Connection {
            host: "pve1".to_string(),
            reason: "connection refused".to_string(),
        }
    }

    fn deploy_offline(args: &DeployArgs) -> (Result<()>, bool) {
        let pve = Pve::new(Box::new(Offline));
        let registry = AppRegistry::new();
        let installer = registry.get(&args.app).unwrap();
        let (spinner, bar) = CommandSpinner::hidden();

        let result = deploy_on(
            &pve,
            args,
            installer,
            Value::Mapping(Mapping::new()),
            &Globals::default(),
            &Config::default(),
            spinner,
        );
        (result, bar.is_finished())
    }

    #[test]
    fn create_error_finishes_spinner() {
        let args = DeployArgs {
            app: "nginx".to_string(),
            create: true,
            ip: Some("300.1.1.1".to_string()),
            ..DeployArgs::default()
        };
        let (result, finished) = deploy_offline(&args);
        assert!(result.is_err());
        assert!(finished);

        let args = DeployArgs {
            ip: None,
            ..args
        };
        let (result, finished) = deploy_offline(&args);
        assert!(result.unwrap_err().to_string().contains("connection refused"));
        assert!(finished);
    }

    #[test]
    fn install_error_finishes_spinner() {
        let args = DeployArgs {
            app: "nginx".to_string(),
            ctid: Some(101),
            ..DeployArgs::default()
        };
        let (result, finished) = deploy_offline(&args);
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("into container 101"));
        assert!(finished);
    }

    #[test]
    fn unconfigured_app_starts_empty() {
        let params = build_params(&Config::default(), "nginx", ParamFile::default(), &[]).unwrap();
        assert_eq!(params, Value::Mapping(Mapping::new()));
    }
}
