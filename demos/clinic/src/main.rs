//! Clinic - entity-dispatch demo
//!
//! Drives three entity stores (patients, pregnancies, deliveries) through
//! one `StoreRoot`:
//! 1. Intents are dispatched to the root
//! 2. The reducer updates bookkeeping and declares gateway requests
//! 3. Requests run as tokio tasks and queue their outcomes
//! 4. Outcomes are dispatched back, notifications and navigation follow
//!
//! Without `--base-url` the stores talk to in-memory gateways seeded with
//! a few records, with simulated latency.
//!
//! # Usage
//!
//! ```sh
//! # In-memory backend, dispatch log on stderr
//! cargo run -p clinic-demo -- --debug
//!
//! # Only log patient outcomes
//! cargo run -p clinic-demo -- --debug --log-include 'patient/*Did*'
//!
//! # Real backend
//! cargo run -p clinic-demo -- --base-url http://localhost:8080/api --token "$TOKEN"
//! ```

mod model;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use entity_dispatch::prelude::*;
use entity_dispatch::testing::MemoryApi;
use entity_dispatch::{ActionLogConfig, EntityState};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use crate::model::{
    seed_patients, seed_pregnancies, Delivery, DeliveryInput, Patient, PatientInput, Pregnancy,
    PregnancyInput,
};

/// Clinic - entity-dispatch demo
#[derive(Parser, Debug)]
#[command(name = "clinic")]
#[command(about = "Walk through patient, pregnancy and delivery stores")]
struct Args {
    /// JSON runtime config (page sizes, labels, notifications, ...)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// REST backend; in-memory gateways are used when absent
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token sent to the REST backend
    #[arg(long)]
    token: Option<String>,

    /// Simulated gateway latency of the in-memory backend, in milliseconds
    #[arg(long, default_value = "40")]
    latency_ms: u64,

    /// Log every dispatched action and print the action log on exit
    #[arg(long)]
    debug: bool,

    /// Comma-separated glob patterns of actions to log
    #[arg(long)]
    log_include: Option<String>,

    /// Comma-separated glob patterns of actions to skip
    #[arg(long)]
    log_exclude: Option<String>,
}

/// Handles kept on the in-memory gateways to inject failures.
struct Memory {
    pregnancies: Arc<MemoryApi<Pregnancy>>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing();

    let mut config = match &args.config {
        Some(path) => RuntimeConfig::from_json_file(path)?,
        None => RuntimeConfig::default()
            .with_page_size(4)
            .with_entity("pregnancy", EntityConfig::default().label("Pregnancy"))
            .with_entity(
                "delivery",
                EntityConfig::default()
                    .label("Delivery")
                    .detail_route("/pregnancies/deliveries")
                    .refresh_after_mutation(true),
            ),
    };
    if args.debug && config.action_log.is_none() {
        config = config.with_action_log(ActionLogConfig::default());
    }

    let filter = ActionLoggerConfig::new(args.log_include.as_deref(), args.log_exclude.as_deref());
    let mut root = StoreRoot::new(config)
        .with_middleware(LoggingMiddleware::new().changes_only())
        .with_middleware(ActionLoggerMiddleware::new(filter).active(args.debug));

    let memory = match &args.base_url {
        Some(base_url) => {
            register_rest::<Patient>(&mut root, base_url, "patients", args.token.as_deref())?;
            register_rest::<Pregnancy>(&mut root, base_url, "pregnancies", args.token.as_deref())?;
            register_rest::<Delivery>(&mut root, base_url, "deliveries", args.token.as_deref())?;
            None
        }
        None => Some(register_memory(&mut root, Duration::from_millis(args.latency_ms))?),
    };
    tracing::info!(entities = ?root.entities(), "stores registered");

    // Follow the patient page counters as they change
    let pages = root.select_stream(select_pagination::<Patient>)?;
    let watcher = tokio::spawn(async move {
        tokio::pin!(pages);
        while let Some(pagination) = pages.next().await {
            tracing::info!(
                page = pagination.page_index + 1,
                pages = pagination.total_pages,
                total = pagination.total_elements,
                "patient pages"
            );
        }
    });

    patients(&mut root).await?;
    pregnancies(&mut root, memory.as_ref()).await?;
    deliveries(&mut root).await?;

    // Logout
    root.reset_all();
    settle(&mut root).await;
    println!(
        "\nafter logout: {} patients cached, {} pregnancies cached",
        root.select(select_all::<Patient>)?.len(),
        root.select(select_all::<Pregnancy>)?.len(),
    );

    if let Some(log) = root.action_log() {
        println!("\n== action log ({} entries) ==", log.len());
        for entry in log.entries() {
            println!(
                "{:>8}  {:<10} {:<18} changed={:?}",
                entry.elapsed_display(),
                entry.entity.unwrap_or("-"),
                entry.name,
                entry.state_changed,
            );
        }
    }

    drop(root);
    watcher.abort();
    Ok(())
}

async fn patients(root: &mut StoreRoot) -> Result<(), StoreError> {
    println!("== patients ==");
    root.dispatch::<Patient>(EntityAction::Reload)?;
    settle(root).await;
    print_page(root.state::<Patient>()?, |p| {
        format!("{} {} <{}>", p.first_name, p.last_name, p.email)
    });

    if root.select(select_has_next_page::<Patient>)? {
        let size = root.select(select_pagination::<Patient>)?.page_size;
        root.dispatch::<Patient>(EntityAction::List(
            ListQuery::page(1, size).sorted("lastName", SortDirection::Asc),
        ))?;
        settle(root).await;
        print_page(root.state::<Patient>()?, |p| p.last_name.clone());
    }

    root.dispatch::<Patient>(EntityAction::Search(SearchQuery::new("dia", 0, 10)))?;
    settle(root).await;
    println!("search 'dia':");
    print_page(root.state::<Patient>()?, |p| p.last_name.clone());

    root.dispatch::<Patient>(EntityAction::Create(PatientInput {
        first_name: "Nafi".into(),
        last_name: "Sarr".into(),
        email: "nafi.sarr@clinic.test".into(),
    }))?;
    settle(root).await;

    if let Some(created) = root.select(select_selected::<Patient>)? {
        println!("created {} ({})", created.id, created.last_name);
        root.dispatch::<Patient>(EntityAction::Update {
            id: created.id.clone(),
            input: PatientInput {
                first_name: created.first_name.clone(),
                last_name: created.last_name.clone(),
                email: "n.sarr@clinic.test".into(),
            },
        })?;
        settle(root).await;
        if let Some(updated) = root.select(select_selected::<Patient>)? {
            println!("updated email: {}", updated.email);
        }
    }
    Ok(())
}

async fn pregnancies(root: &mut StoreRoot, memory: Option<&Memory>) -> Result<(), StoreError> {
    println!("\n== pregnancies ==");
    root.dispatch::<Pregnancy>(EntityAction::List(
        ListQuery::page(0, 10).filter("status", "ACTIVE"),
    ))?;
    settle(root).await;
    print_page(root.state::<Pregnancy>()?, |g| {
        format!("{} patient={} lmp={}", g.id, g.patient_id, g.lmp_date)
    });

    let recent = root.select(select_by_date_range(
        |g: &Pregnancy| Some(g.lmp_date.clone()),
        "2026-04-01".to_string(),
        "2026-12-31".to_string(),
    ))?;
    println!("active since April: {}", recent.len());

    // The backend refuses a second active pregnancy for the same patient
    if let Some(memory) = memory {
        memory.pregnancies.fail_next(ApiError::http(
            409,
            "Patient p1 already has an active pregnancy",
        ));
    }
    root.dispatch::<Pregnancy>(EntityAction::Create(PregnancyInput {
        patient_id: "p1".into(),
        status: "ACTIVE".into(),
        lmp_date: "2026-09-01".into(),
    }))?;
    settle(root).await;
    if let Some(error) = root.select(select_error::<Pregnancy>)? {
        println!("create refused: {error}");
    }

    root.dispatch::<Pregnancy>(EntityAction::Fetch("g1".into()))?;
    settle(root).await;
    let active = root.select(select_by_status(|g: &Pregnancy| g.status.as_str(), "ACTIVE"))?;
    println!(
        "selected {:?}, {} active on page",
        root.select(select_selected_id::<Pregnancy>)?,
        active.len()
    );
    Ok(())
}

async fn deliveries(root: &mut StoreRoot) -> Result<(), StoreError> {
    println!("\n== deliveries ==");
    root.dispatch::<Delivery>(EntityAction::Reload)?;
    settle(root).await;

    root.dispatch::<Delivery>(EntityAction::Create(DeliveryInput {
        pregnancy_id: "g1".into(),
        delivered_on: "2026-10-12".into(),
        mode: "VAGINAL".into(),
    }))?;
    settle(root).await;
    print_page(root.state::<Delivery>()?, |d| {
        format!("{} pregnancy={} on {}", d.delivery_id, d.pregnancy_id, d.delivered_on)
    });

    if let Some(id) = root.select(select_selected_id::<Delivery>)? {
        root.dispatch::<Delivery>(EntityAction::Remove(id))?;
        settle(root).await;
    }
    println!(
        "deliveries left: {}",
        root.select(select_pagination::<Delivery>)?.total_elements
    );
    Ok(())
}

fn register_rest<T>(
    root: &mut StoreRoot,
    base_url: &str,
    resource: &str,
    token: Option<&str>,
) -> Result<(), StoreError>
where
    T: Entity + DeserializeOwned,
    T::Input: Serialize,
{
    let mut api = RestApi::<T>::new(base_url, resource);
    api.set_bearer(token.map(str::to_string));
    root.register::<T>(api, Arc::new(TracingNotifier), Arc::new(TracingNavigator))
}

fn register_memory(root: &mut StoreRoot, latency: Duration) -> Result<Memory, StoreError> {
    let patients = MemoryApi::<Patient>::new(Patient::build)
        .with_records(seed_patients())
        .with_latency(latency);

    let pregnancies = Arc::new(
        MemoryApi::<Pregnancy>::new(Pregnancy::build)
            .with_records(seed_pregnancies())
            .with_filter(|g: &Pregnancy, key, value| match key {
                "status" => g.status == value,
                "patientId" => g.patient_id == value,
                _ => true,
            })
            .with_latency(latency),
    );

    let deliveries = MemoryApi::<Delivery>::new(Delivery::build).with_latency(latency);

    root.register::<Patient>(patients, Arc::new(TracingNotifier), Arc::new(TracingNavigator))?;
    root.register::<Pregnancy>(
        Arc::clone(&pregnancies),
        Arc::new(TracingNotifier),
        Arc::new(TracingNavigator),
    )?;
    root.register::<Delivery>(deliveries, Arc::new(TracingNotifier), Arc::new(TracingNavigator))?;

    Ok(Memory { pregnancies })
}

/// Deliver outcomes until no call is running and the queue is empty.
async fn settle(root: &mut StoreRoot) {
    loop {
        let idle = root.pending() == 0;
        let delivered = root.process_pending();
        if idle && delivered == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn print_page<T: Entity>(state: &EntityState<T>, line: impl Fn(&T) -> String) {
    let pagination = state.pagination;
    println!(
        "page {}/{} ({} total)",
        pagination.page_index + 1,
        pagination.total_pages.max(1),
        pagination.total_elements
    );
    for item in &state.items {
        println!("  {:<12} {}", item.id(), line(item));
    }
    if let Some(error) = &state.error {
        println!("  error: {error}");
    }
}
