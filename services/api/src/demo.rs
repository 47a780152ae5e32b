use crate::infra::InMemoryActivityStore;
use clap::Args;
use linkfolio::badges::{
    ActivityKind, BadgeCatalog, BadgeDefinition, BadgeEvaluationService, Metric,
    SqliteAwardLedger, TracingNotifier, UserId,
};
use linkfolio::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct CatalogListArgs {
    /// Catalog JSON file to list (defaults to the built-in catalog)
    #[arg(long)]
    pub(crate) path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct CatalogCheckArgs {
    /// Catalog JSON file to validate
    #[arg(long)]
    pub(crate) path: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Profile identifier used for the walkthrough
    #[arg(long, default_value = "demo-user")]
    pub(crate) user: String,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            user: "demo-user".to_string(),
        }
    }
}

pub(crate) fn run_catalog_list(args: CatalogListArgs) -> Result<(), AppError> {
    let catalog = match args.path {
        Some(path) => BadgeCatalog::from_path(path)?,
        None => BadgeCatalog::standard()?,
    };

    println!("Badge catalog ({} badges)", catalog.len());
    for definition in catalog.list_definitions() {
        render_definition(definition);
    }

    Ok(())
}

pub(crate) fn run_catalog_check(args: CatalogCheckArgs) -> Result<(), AppError> {
    match BadgeCatalog::from_path(&args.path) {
        Ok(catalog) => {
            let metrics: Vec<&str> = catalog
                .referenced_metrics()
                .into_iter()
                .map(Metric::name)
                .collect();
            println!(
                "{}: {} badges, metrics used: {}",
                args.path.display(),
                catalog.len(),
                metrics.join(", ")
            );
            Ok(())
        }
        Err(err) => {
            println!("{}: {}", args.path.display(), err);
            Err(AppError::from(err))
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let catalog = Arc::new(BadgeCatalog::standard()?);
    let ledger = Arc::new(SqliteAwardLedger::open_in_memory()?);
    let store = Arc::new(InMemoryActivityStore::default());
    let service = BadgeEvaluationService::new(
        catalog.clone(),
        ledger,
        store.clone(),
        Arc::new(TracingNotifier),
    );
    let user_id = UserId(args.user);

    println!("Badge engine demo for profile '{}'", user_id);

    let steps: [(&str, ActivityKind, &[(Metric, u64)]); 6] = [
        ("Signs in for the first time", ActivityKind::Login, &[]),
        (
            "Adds a first link",
            ActivityKind::LinkCreated,
            &[(Metric::LinkCount, 1)],
        ),
        (
            "Uploads a profile background",
            ActivityKind::BackgroundUploaded,
            &[(Metric::BackgroundUploads, 1)],
        ),
        (
            "Keeps curating links",
            ActivityKind::LinkCreated,
            &[(Metric::LinkCount, 6)],
        ),
        (
            "Profile picks up traffic",
            ActivityKind::ProfileViewed,
            &[(Metric::ProfileViews, 140), (Metric::AccountAgeDays, 8)],
        ),
        (
            "Prunes a stale link",
            ActivityKind::LinkDeleted,
            &[(Metric::LinkCount, 5)],
        ),
    ];

    for (label, kind, updates) in steps {
        for (metric, value) in updates {
            store.set(&user_id, *metric, *value);
        }

        let granted = service.on_activity_event(&user_id, kind);
        println!("\n{} ({})", label, kind.label());
        if granted.is_empty() {
            println!("- no new badges");
            continue;
        }
        for record in granted {
            match catalog.get(&record.badge_id) {
                Some(definition) => println!(
                    "- earned {} [{}]",
                    definition.title,
                    definition.rarity.label()
                ),
                None => println!("- earned {}", record.badge_id),
            }
        }
    }

    println!("\nBadges held");
    for held in service.badges_for(&user_id)? {
        println!(
            "- {} since {}",
            held.title.as_deref().unwrap_or(held.badge_id.as_str()),
            held.awarded_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

fn render_definition(definition: &BadgeDefinition) {
    println!(
        "- {} | {} | {} | {}",
        definition.id,
        definition.title,
        definition.rarity.label(),
        definition.rule
    );
    if !definition.description.is_empty() {
        println!("  {}", definition.description);
    }
}
