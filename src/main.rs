use std::process;

use querykey::{
    cache::{
        EntityKind, FilterSet, InvalidKeyError, InvalidationResolver, InvalidationTarget, Scope,
        derive_key,
    },
    config::{self, Command, DeriveArgs, LoadError, ResolveArgs, Settings},
    infra::{error::InfraError, telemetry},
};
use serde_json::json;
use thiserror::Error;
use tracing::{Dispatch, Level, debug, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Key(#[from] InvalidKeyError),
    #[error("filters are not valid JSON: {0}")]
    FiltersJson(#[source] serde_json::Error),
    #[error("{0}")]
    Usage(&'static str),
}

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;
    debug!(
        dependency_kinds = settings.dependencies.len(),
        "configuration loaded"
    );

    let output = match cli_args.command {
        Command::Derive(args) => render_derive(&args)?,
        Command::Resolve(args) => render_resolve(&settings, &args)?,
        Command::Table => render_table(&settings)?,
    };
    println!("{output}");
    Ok(())
}

fn render_derive(args: &DeriveArgs) -> Result<String, AppError> {
    let scope = args.scope.as_deref().map(str::parse::<Scope>).transpose()?;
    let filters = match args.filters.as_deref() {
        Some(raw) => {
            let value: serde_json::Value =
                serde_json::from_str(raw).map_err(AppError::FiltersJson)?;
            Some(FilterSet::try_from(value)?)
        }
        None => None,
    };

    let key = derive_key(&args.kind, scope.as_ref(), filters.as_ref())?;
    let output = json!({
        "key": key,
        "fingerprint": key.fingerprint(),
    });
    Ok(serde_json::to_string_pretty(&output).map_err(InfraError::from)?)
}

/// One invalidation prefix per line.
fn render_resolve(settings: &Settings, args: &ResolveArgs) -> Result<String, AppError> {
    if args.id.is_some() && args.kinds.len() > 1 {
        return Err(AppError::Usage("--id can only be combined with a single kind"));
    }

    let targets = args
        .kinds
        .iter()
        .map(|raw| {
            let kind = EntityKind::new(raw)?;
            Ok(match args.id.as_deref() {
                Some(id) => InvalidationTarget::record(kind, id),
                None => InvalidationTarget::kind(kind),
            })
        })
        .collect::<Result<Vec<_>, InvalidKeyError>>()?;

    let resolver = InvalidationResolver::new(settings.dependencies.clone());
    let plan = resolver.resolve_all(&targets)?;
    debug!(plan = %plan, "invalidation resolved");

    Ok(plan
        .prefixes()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n"))
}

fn render_table(settings: &Settings) -> Result<String, AppError> {
    Ok(serde_json::to_string_pretty(&settings.dependencies).map_err(InfraError::from)?)
}

#[cfg(test)]
mod tests {
    use querykey::cache::{CacheConfig, DependencyTable};
    use querykey::config::{LogFormat, LoggingSettings};
    use serde_json::Value;
    use tracing::level_filters::LevelFilter;

    use super::*;

    fn kind(name: &str) -> EntityKind {
        EntityKind::new(name).expect("valid kind")
    }

    fn settings() -> Settings {
        Settings {
            logging: LoggingSettings {
                level: LevelFilter::WARN,
                format: LogFormat::Compact,
            },
            cache: CacheConfig::default(),
            dependencies: DependencyTable::builder()
                .depends(kind("clients"), kind("cases"))
                .depends(kind("clients"), kind("invoices"))
                .build(),
        }
    }

    fn resolve_args(kinds: &[&str], id: Option<&str>) -> ResolveArgs {
        ResolveArgs {
            kinds: kinds.iter().map(|kind| kind.to_string()).collect(),
            id: id.map(str::to_string),
        }
    }

    #[test]
    fn resolve_lists_one_prefix_per_line() {
        let output = render_resolve(&settings(), &resolve_args(&["clients"], Some("c123")))
            .expect("resolved");
        assert_eq!(
            output,
            "[\"cases\"]\n[\"clients\",\"detail\",\"c123\"]\n[\"invoices\"]"
        );
    }

    #[test]
    fn resolve_rejects_id_with_several_kinds() {
        let err = render_resolve(&settings(), &resolve_args(&["clients", "cases"], Some("c1")))
            .unwrap_err();
        assert!(matches!(err, AppError::Usage(_)));
    }

    #[test]
    fn resolve_rejects_malformed_kind() {
        let err = render_resolve(&settings(), &resolve_args(&["case files"], None)).unwrap_err();
        assert!(matches!(err, AppError::Key(_)));
    }

    #[test]
    fn derive_prints_key_and_fingerprint() {
        let args = DeriveArgs {
            kind: "clients".to_string(),
            scope: Some("list".to_string()),
            filters: Some(r#"{"status":"active","page":null}"#.to_string()),
        };
        let output: Value =
            serde_json::from_str(&render_derive(&args).expect("derived")).expect("json output");

        assert_eq!(output["key"], serde_json::json!(["clients", "list", {"status": "active"}]));
        assert_eq!(
            output["fingerprint"],
            "5cbd494c0bc19f216d4744824243ab8c1fd1a1f4745489e79fc63ec589c9db0b"
        );
    }

    #[test]
    fn derive_rejects_invalid_filter_json() {
        let args = DeriveArgs {
            kind: "clients".to_string(),
            scope: None,
            filters: Some("{status".to_string()),
        };
        assert!(matches!(render_derive(&args), Err(AppError::FiltersJson(_))));
    }

    #[test]
    fn table_prints_configured_dependencies() {
        let output: Value =
            serde_json::from_str(&render_table(&settings()).expect("table")).expect("json output");
        assert_eq!(output, serde_json::json!({ "clients": ["cases", "invoices"] }));
    }
}
