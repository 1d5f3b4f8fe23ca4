use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dispense_core::{
    compute_status, DispenseWorkflow, FieldEdit, PharmacyConfig, SessionContext, UserPrivileges,
};
use fhir::{
    parse_fhir_datetime, parse_resource, parse_resources, MedicationDispense, MedicationRequest,
    OrderConfig, ValueSet,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dispense")]
#[command(about = "Medication dispense review tools")]
struct Cli {
    /// Pharmacy configuration file (YAML)
    #[arg(long, global = true, env = "DISPENSE_CONFIG")]
    config: Option<PathBuf>,
    /// Days after which an unfulfilled order counts as expired
    #[arg(long, global = true, env = "DISPENSE_EXPIRATION_DAYS")]
    expiration_days: Option<u32>,
    /// Evaluate as of this instant (RFC 3339) instead of the current time
    #[arg(long, global = true)]
    now: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify orders as active, completed, expired or cancelled
    Status {
        /// MedicationRequest JSON: a resource, an array, or a searchset Bundle
        orders: PathBuf,
    },
    /// Build the initial dispense records for the active orders
    Assemble {
        /// MedicationRequest JSON: a resource, an array, or a searchset Bundle
        orders: PathBuf,
        /// Session (user, current_provider, session_location) as YAML
        #[arg(long)]
        session: Option<PathBuf>,
    },
    /// Reconcile a dispense record with its reference data and apply edits
    Review {
        /// MedicationDispense JSON
        dispense: PathBuf,
        /// The order the dispense was made against
        #[arg(long)]
        order: Option<PathBuf>,
        /// Order-entry configuration JSON
        #[arg(long)]
        order_config: Option<PathBuf>,
        /// Substitution type ValueSet JSON
        #[arg(long)]
        substitution_types: Option<PathBuf>,
        /// Substitution reason ValueSet JSON
        #[arg(long)]
        substitution_reasons: Option<PathBuf>,
        /// Session (user, current_provider, session_location) as YAML
        #[arg(long)]
        session: Option<PathBuf>,
        /// Field edit as field=value, e.g. quantity=30 or medication=Medication/222
        #[arg(long = "edit")]
        edits: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(), cli.expiration_days)?;
    let now = resolve_now(cli.now.as_deref())?;

    match cli.command {
        Some(Commands::Status { orders }) => {
            let orders: Vec<MedicationRequest> = parse_resources(&read(&orders)?)?;
            if orders.is_empty() {
                println!("No orders found.");
            }
            for order in &orders {
                let status = compute_status(order, config.expiration_period_in_days(), now);
                println!(
                    "ID: {}, Status: {}{}",
                    order.id.as_deref().unwrap_or("<none>"),
                    status,
                    status
                        .tag_label()
                        .map(|tag| format!(" [{tag}]"))
                        .unwrap_or_default()
                );
            }
        }
        Some(Commands::Assemble { orders, session }) => {
            let orders: Vec<MedicationRequest> = parse_resources(&read(&orders)?)?;
            let session = load_session(session.as_deref())?;
            let dispenses = dispense_core::initiate_dispenses(&orders, &session, &config, now);
            println!("{}", serde_json::to_string_pretty(&dispenses)?);
        }
        Some(Commands::Review {
            dispense,
            order,
            order_config,
            substitution_types,
            substitution_reasons,
            session,
            edits,
        }) => {
            let record: MedicationDispense = parse_resource(&read(&dispense)?)?;
            let order: Option<MedicationRequest> = order
                .as_deref()
                .map(|path| -> anyhow::Result<MedicationRequest> {
                    Ok(parse_resource(&read(path)?)?)
                })
                .transpose()?;
            let edits = edits
                .iter()
                .map(|raw| parse_edit(raw))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let mut workflow =
                DispenseWorkflow::new(config, load_session(session.as_deref())?, UserPrivileges);
            let handle = workflow.insert(record);

            if let Some(path) = order_config {
                workflow.on_order_config(OrderConfig::parse(&read(&path)?)?);
            }
            if let Some(path) = substitution_types {
                let value_set: ValueSet = parse_resource(&read(&path)?)?;
                if !workflow.on_substitution_types(&value_set) {
                    tracing::warn!(
                        path = %path.display(),
                        "value set is not the configured substitution type set"
                    );
                }
            }
            if let Some(path) = substitution_reasons {
                let value_set: ValueSet = parse_resource(&read(&path)?)?;
                if !workflow.on_substitution_reasons(&value_set) {
                    tracing::warn!(
                        path = %path.display(),
                        "value set is not the configured substitution reason set"
                    );
                }
            }

            workflow
                .apply_cycle(handle, order.as_ref(), &edits)
                .context("failed to apply edits")?;

            let record = workflow
                .record(handle)
                .context("dispense record disappeared")?;
            let persist = record.persist_request();
            let output = serde_json::json!({
                "canModify": workflow.can_modify(),
                "save": {
                    "method": persist.method.http_method(),
                    "path": persist.path,
                },
                "options": workflow.options(handle),
                "record": record,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        None => {
            println!("Use 'dispense --help' for commands");
        }
    }

    Ok(())
}

/// Config file first, then the expiration override; flags beat environment values.
fn resolve_config(
    path: Option<&Path>,
    expiration_days: Option<u32>,
) -> anyhow::Result<PharmacyConfig> {
    let config = match path {
        Some(path) => PharmacyConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PharmacyConfig::default(),
    };
    match expiration_days {
        Some(days) => Ok(config.with_expiration_period_in_days(days)?),
        None => Ok(config),
    }
}

fn resolve_now(now: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match now {
        Some(raw) => match parse_fhir_datetime(raw) {
            Some(parsed) => Ok(parsed),
            None => bail!("--now is not a valid date-time: {raw}"),
        },
        None => Ok(Utc::now()),
    }
}

fn load_session(path: Option<&Path>) -> anyhow::Result<SessionContext> {
    match path {
        Some(path) => serde_yaml::from_str(&read(path)?)
            .with_context(|| format!("failed to parse session from {}", path.display())),
        None => Ok(SessionContext::default()),
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn parse_edit(raw: &str) -> anyhow::Result<FieldEdit> {
    let Some((field, value)) = raw.split_once('=') else {
        bail!("edit must be field=value: {raw}");
    };
    let value = value.trim().to_owned();
    let edit = match field.trim() {
        "quantity" => FieldEdit::quantity_value(&value)?,
        "quantity-unit" => FieldEdit::QuantityUnit(value),
        "dose" => FieldEdit::dose_value(&value)?,
        "dose-unit" => FieldEdit::DoseUnit(value),
        "route" => FieldEdit::Route(value),
        "frequency" => FieldEdit::Frequency(value),
        "instructions" => FieldEdit::Instructions(value),
        "medication" => FieldEdit::Medication {
            reference: value,
            display: None,
        },
        "substitution-type" => FieldEdit::SubstitutionType(value),
        "substitution-reason" => FieldEdit::SubstitutionReason(value),
        other => bail!("unknown field: {other}"),
    };
    Ok(edit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_edits() {
        assert!(matches!(
            parse_edit("quantity=30").expect("quantity"),
            FieldEdit::QuantityValue(q) if q.get() == 30.0
        ));
        assert_eq!(
            parse_edit("route = r-oral").expect("route"),
            FieldEdit::Route("r-oral".into())
        );
        assert!(parse_edit("dose=-1").is_err());
        assert!(parse_edit("colour=red").is_err());
        assert!(parse_edit("quantity").is_err());
    }

    #[test]
    fn expiration_flag_overrides_default() {
        let config = resolve_config(None, Some(30)).expect("config");
        assert_eq!(config.expiration_period_in_days(), 30);
        assert!(resolve_config(None, Some(0)).is_err());
    }

    #[test]
    fn now_accepts_fhir_datetimes() {
        assert!(resolve_now(Some("2024-03-01T12:00:00Z")).is_ok());
        assert!(resolve_now(Some("soon")).is_err());
    }
}
