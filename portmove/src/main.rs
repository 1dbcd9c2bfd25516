use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use commands::CiscoIos;
use inventory_store::InventoryStore;
use move_planner::{MigrationPlan, MoveRequest, SourceSelector};
use portmove_core::{exit_code_for, Inventory, MigrateError};
use resilience::{FinalRequest, ResilienceOptions};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

mod audit;
mod config;

use audit::Recorder;
use config::Config;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "portmove",
    version,
    about = "Plan and track host moves between access-switch ports"
)]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./portmove.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Inventory snapshot; overrides store.dir/store.file from the config
    #[arg(long, global = true, value_name = "FILE")]
    store: Option<PathBuf>,
    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Summary format on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Create the inventory from a port CSV
    /// (switch_id, port_id, status, vlan, description, ...)
    Init {
        csv: PathBuf,
        /// Replace an existing inventory
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Apply operator-chosen final switches from a CSV (switch_id, port_id, final_switch)
    Mark { csv: PathBuf },
    /// Assign final switches to critical hosts on retiring switches
    Final {
        /// Switch being retired (repeatable or comma separated)
        #[arg(long = "from", required = true, value_delimiter = ',')]
        sources: Vec<String>,
        /// Candidate destination switch
        #[arg(long = "to", required = true, value_delimiter = ',')]
        destinations: Vec<String>,
        #[arg(long)]
        min_switches: Option<usize>,
        #[arg(long)]
        max_skew: Option<usize>,
        /// Print the assignment without saving it
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Plan moves, reserve destination ports and write the runsheet
    Move {
        /// Source switch, or SWITCH:PORT for a single port
        #[arg(long = "from", required = true, value_delimiter = ',')]
        sources: Vec<String>,
        /// Destination switch for hosts without a final switch
        #[arg(long = "to", value_delimiter = ',')]
        destinations: Vec<String>,
        /// Also move connected non-critical ports on source switches
        #[arg(long, default_value_t = false)]
        include_noncritical: bool,
        /// Runsheet CSV; commands go beside it with a .cfg extension
        #[arg(long, value_name = "FILE")]
        runsheet: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Reconcile the inventory with an executed runsheet
    Update {
        report: PathBuf,
        /// Write the reconciled inventory here instead of replacing the store
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Confirm executed moves against a fresh port CSV
    Verify { csv: PathBuf },
    /// Port status report (not implemented)
    Status {
        switch: Option<String>,
        port: Option<String>,
    },
    /// Flattened inventory export (not implemented)
    Flatten,
    /// Recorded relocations of a host
    #[cfg(feature = "audit")]
    History { host: String },
}

fn init_tracing(verbose: u8, configured: Option<&str>) {
    let level = match verbose {
        0 => configured.unwrap_or("info"),
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn failure_json(e: &MigrateError) -> serde_json::Value {
    serde_json::json!({
        "code": e.code(),
        "key": e.key().map(|k| k.to_string()),
        "message": e.to_string(),
    })
}

/// Summary line(s) on stdout, failures listed one per line with their key.
fn report(
    format: OutputFormat,
    command: &str,
    mut obj: serde_json::Value,
    text: &[String],
    failures: &[MigrateError],
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for line in text {
                println!("{}", line);
            }
            for e in failures {
                println!("failed [{}] {}", e.code(), e);
            }
        }
        OutputFormat::Json => {
            obj["command"] = serde_json::json!(command);
            obj["failures"] =
                serde_json::Value::Array(failures.iter().map(failure_json).collect());
            println!("{}", serde_json::to_string(&obj)?);
        }
    }
    Ok(())
}

fn open_csv(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("opening {}", path.display()))
}

fn load(store: &InventoryStore) -> Result<Inventory> {
    let inv = store.load()?;
    for w in inv.validate() {
        tracing::warn!("{}", w);
    }
    Ok(inv)
}

fn write_runsheet(path: &Path, plan: &MigrationPlan, renderer: &CiscoIos) -> Result<PathBuf> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    runsheet::write_runsheet(BufWriter::new(file), plan, renderer)?;
    let cfg_path = path.with_extension("cfg");
    let cfg_file =
        File::create(&cfg_path).with_context(|| format!("creating {}", cfg_path.display()))?;
    let mut w = BufWriter::new(cfg_file);
    w.write_all(commands::render_plan(renderer, plan).as_bytes())?;
    w.flush()?;
    Ok(cfg_path)
}

fn run(cli: Cli, cfg: Config) -> Result<i32> {
    let store = InventoryStore::new(cli.store.clone().unwrap_or_else(|| cfg.store_path()));
    let format = cli.format;
    match cli.command {
        Commands::Version => {
            println!(
                "portmove {} (core {})",
                env!("CARGO_PKG_VERSION"),
                portmove_core::version()
            );
            Ok(0)
        }
        Commands::Init { csv, force } => {
            if store.exists() && !force {
                bail!("{} already exists; use --force to replace it", store.path().display());
            }
            let opts = import::ImportOptions { critical_vlans: cfg.critical_vlans() };
            let out = import::import_ports(open_csv(&csv)?, &opts)?;
            store.save(&out.inventory)?;
            let critical = out.inventory.all().filter(|r| r.critical).count();
            let args = serde_json::json!({ "csv": csv, "force": force });
            if let Some(mut rec) = Recorder::start(&cfg, "init", args) {
                rec.succeeded(out.inventory.len());
                rec.failures("import", &out.rejected);
                rec.finish();
            }
            report(
                format,
                "init",
                serde_json::json!({
                    "store": store.path(),
                    "ports": out.inventory.len(),
                    "critical": critical,
                    "switches": out.inventory.switch_ids(),
                }),
                &[format!(
                    "imported {} ports ({} critical) into {}",
                    out.inventory.len(),
                    critical,
                    store.path().display()
                )],
                &out.rejected,
            )?;
            Ok(exit_code_for(&out.rejected))
        }
        Commands::Mark { csv } => {
            let mut inv = load(&store)?;
            let out = import::apply_final_assignments(&mut inv, open_csv(&csv)?)?;
            store.save(&inv)?;
            let args = serde_json::json!({ "csv": csv });
            if let Some(mut rec) = Recorder::start(&cfg, "mark", args) {
                rec.succeeded(out.marked.len());
                rec.failures("mark", &out.failures);
                rec.finish();
            }
            let marked: Vec<String> = out.marked.iter().map(|k| k.to_string()).collect();
            let text = [format!("marked {} ports", marked.len())];
            let obj = serde_json::json!({ "marked": marked });
            report(format, "mark", obj, &text, &out.failures)?;
            Ok(exit_code_for(&out.failures))
        }
        Commands::Final { sources, destinations, min_switches, max_skew, dry_run } => {
            let mut inv = load(&store)?;
            let file = cfg.resilience.clone().unwrap_or_default();
            let defaults = ResilienceOptions::default();
            let options = ResilienceOptions {
                min_switches: min_switches.or(file.min_switches).unwrap_or(defaults.min_switches),
                max_skew: max_skew.or(file.max_skew).or(defaults.max_skew),
            };
            let req = FinalRequest {
                sources: sources.clone(),
                destinations: destinations.clone(),
                options,
            };
            let plan = if dry_run {
                resilience::plan_finals(&inv, &req)?
            } else {
                resilience::assign_finals(&mut inv, &req)?
            };
            if !dry_run {
                store.save(&inv)?;
                let args = serde_json::json!({ "from": sources, "to": destinations });
                if let Some(mut rec) = Recorder::start(&cfg, "final", args) {
                    rec.succeeded(plan.assignments.len());
                    rec.finish();
                }
            }
            let mut text: Vec<String> = plan
                .assignments
                .iter()
                .map(|a| format!("{} {} -> {}", a.port, a.host, a.final_switch))
                .collect();
            let load: Vec<String> =
                plan.load.iter().map(|(sw, n)| format!("{}={}", sw, n)).collect();
            text.push(format!("load: {}", load.join(" ")));
            let obj = serde_json::json!({
                "dry_run": dry_run,
                "assignments": plan.assignments,
                "load": plan.load,
            });
            report(format, "final", obj, &text, &[])?;
            Ok(0)
        }
        Commands::Move { sources, destinations, include_noncritical, runsheet: sheet, dry_run } => {
            let mut inv = load(&store)?;
            let selectors = sources
                .iter()
                .map(|s| SourceSelector::parse(s))
                .collect::<portmove_core::Result<Vec<_>>>()?;
            let req = MoveRequest {
                sources: selectors,
                destinations: destinations.clone(),
                include_noncritical: include_noncritical || cfg.include_noncritical(),
            };
            let plan = move_planner::plan_moves(&inv, &req);
            let c = cfg.commands.clone().unwrap_or_default();
            let renderer = CiscoIos {
                extra_access_lines: c.extra_access_lines.unwrap_or_default(),
                port_security: c.port_security.unwrap_or(true),
            };
            let sheet = sheet.unwrap_or_else(|| cfg.runsheet_path());
            let mut text = Vec::new();
            for m in &plan.moves {
                let tag = if m.final_match { " (final)" } else { "" };
                text.push(format!(
                    "{} {} -> {}{}",
                    m.source.key(),
                    m.source.description,
                    m.destination.key(),
                    tag
                ));
            }
            if !dry_run {
                if !plan.moves.is_empty() {
                    let cfg_path = write_runsheet(&sheet, &plan, &renderer)?;
                    text.push(format!(
                        "runsheet {}, commands {}",
                        sheet.display(),
                        cfg_path.display()
                    ));
                }
                plan.apply(&mut inv);
                store.save(&inv)?;
                let args = serde_json::json!({ "from": sources, "to": destinations });
                if let Some(mut rec) = Recorder::start(&cfg, "move", args) {
                    for m in &plan.moves {
                        let (from, to) = (m.source.key(), m.destination.key());
                        rec.relocation(&m.source.description, &from, &to, "planned");
                    }
                    rec.failures("move", &plan.failures);
                    rec.finish();
                }
            }
            let moves: Vec<serde_json::Value> = plan
                .moves
                .iter()
                .map(|m| {
                    let r = commands::CommandRenderer::render(&renderer, m);
                    serde_json::json!({
                        "host": m.source.description,
                        "from": m.source.key().to_string(),
                        "to": m.destination.key().to_string(),
                        "final_match": m.final_match,
                        "disable": r.disable,
                        "enable": r.enable,
                    })
                })
                .collect();
            let obj = serde_json::json!({ "dry_run": dry_run, "moves": moves });
            report(format, "move", obj, &text, &plan.failures)?;
            Ok(exit_code_for(&plan.failures))
        }
        Commands::Update { report: report_path, output } => {
            let mut inv = load(&store)?;
            let parsed = runsheet::read_report(open_csv(&report_path)?)?;
            let out = reconcile::reconcile(&mut inv, &parsed.lines);
            let target =
                output.as_ref().map(InventoryStore::new).unwrap_or_else(|| store.clone());
            target.save(&inv)?;
            let mut failures = parsed.errors;
            failures.extend(out.errors);
            let args = serde_json::json!({ "report": report_path, "output": output });
            if let Some(mut rec) = Recorder::start(&cfg, "update", args) {
                for r in &out.relocations {
                    rec.relocation(&r.host, &r.from, &r.to, "executed");
                    // keep the history reachable under the name it was planned with
                    if let Some(previous) = &r.previous {
                        rec.relocation(previous, &r.from, &r.to, "executed");
                    }
                }
                for l in parsed.lines.iter().filter(|l| out.released.contains(&l.source)) {
                    let to = l.destination().cloned().unwrap_or_else(|| l.source.clone());
                    let host =
                        inv.record(&l.source).map(|r| r.description.clone()).unwrap_or_default();
                    rec.relocation(&host, &l.source, &to, "released");
                }
                rec.failures("update", &failures);
                rec.finish();
            }
            let mut text: Vec<String> = out
                .relocations
                .iter()
                .map(|r| format!("{} {} -> {}", r.host, r.from, r.to))
                .collect();
            text.push(format!(
                "{} moved, {} released, {} partial, {} already applied, {} pending; saved to {}",
                out.relocations.len(),
                out.released.len(),
                out.partial.len(),
                out.already_applied.len(),
                parsed.pending.len(),
                target.path().display()
            ));
            let keys = |v: &[portmove_core::PortKey]| {
                v.iter().map(|k| k.to_string()).collect::<Vec<_>>()
            };
            report(
                format,
                "update",
                serde_json::json!({
                    "relocations": out.relocations,
                    "released": keys(&out.released),
                    "partial": keys(&out.partial),
                    "already_applied": keys(&out.already_applied),
                    "pending": keys(&parsed.pending),
                    "output": target.path(),
                }),
                &text,
                &failures,
            )?;
            Ok(exit_code_for(&failures))
        }
        Commands::Verify { csv } => {
            let mut inv = load(&store)?;
            let opts = import::ImportOptions { critical_vlans: cfg.critical_vlans() };
            let observed = import::import_ports(open_csv(&csv)?, &opts)?;
            for e in &observed.rejected {
                tracing::warn!("observation row skipped: {}", e);
            }
            let out = reconcile::confirm(&mut inv, &observed.inventory);
            store.save(&inv)?;
            let args = serde_json::json!({ "csv": csv });
            if let Some(mut rec) = Recorder::start(&cfg, "verify", args) {
                for k in &out.confirmed {
                    let host =
                        inv.record(k).map(|r| r.description.clone()).unwrap_or_default();
                    rec.relocation(&host, k, k, "confirmed");
                }
                rec.finish();
            }
            let confirmed: Vec<String> = out.confirmed.iter().map(|k| k.to_string()).collect();
            let unconfirmed: Vec<String> = out.unconfirmed.iter().map(|k| k.to_string()).collect();
            let mut text: Vec<String> =
                confirmed.iter().map(|k| format!("confirmed {}", k)).collect();
            text.extend(unconfirmed.iter().map(|k| format!("unconfirmed {}", k)));
            let obj = serde_json::json!({ "confirmed": confirmed, "unconfirmed": unconfirmed });
            report(format, "verify", obj, &text, &[])?;
            Ok(0)
        }
        Commands::Status { switch, port } => {
            tracing::debug!(?switch, ?port, "status requested");
            eprintln!("status: not implemented");
            Ok(0)
        }
        Commands::Flatten => {
            eprintln!("flatten: not implemented");
            Ok(0)
        }
        #[cfg(feature = "audit")]
        Commands::History { host } => {
            let log = audit_sqlite::AuditLog::open_or_create(cfg.audit_path())?;
            let history = log.host_history(&host)?;
            let text: Vec<String> = history
                .iter()
                .map(|r| format!("{} {} -> {} {}", r.at_ms, r.from, r.to, r.outcome))
                .collect();
            let origin = log.origin_of(&host)?.map(|k| k.to_string());
            let obj = serde_json::json!({
                "host": host,
                "origin": origin,
                "relocations": history,
            });
            report(format, "history", obj, &text, &[])?;
            Ok(0)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    };
    init_tracing(cli.verbose, cfg.log_level());
    let code = match run(cli, cfg) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            e.downcast_ref::<MigrateError>().map(MigrateError::exit_code).unwrap_or(1)
        }
    };
    std::process::exit(code);
}
