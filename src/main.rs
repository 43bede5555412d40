//! cardledger - command-line front end
//!
//! ```text
//! cardledger [-e ENV] init-db
//! cardledger [-e ENV] issue <phone> <card_number> [debit|credit]
//! cardledger [-e ENV] top-up <card_id> <amount>
//! cardledger [-e ENV] toggle-block <card_id>
//! cardledger [-e ENV] request-card <phone>
//! cardledger [-e ENV] requests
//! cardledger [-e ENV] approve <request_id> <card_number> [debit|credit]
//! cardledger [-e ENV] cards <owner_id>
//! cardledger [-e ENV] transfer <from_card> <to_card> <amount> [--note TEXT]
//! cardledger [-e ENV] balance <card_id>
//! cardledger [-e ENV] history <card_id> [--limit N]
//! cardledger [-e ENV] demo
//! ```
//!
//! Results are printed to stdout as JSON. `demo` runs against an in-memory
//! store; every other command needs `postgres_url` (or `DATABASE_URL`).

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;

use cardledger::config::{AppConfig, TransferConfig};
use cardledger::db::Database;
use cardledger::transfer::ErrorResponse;
use cardledger::{
    CardAdmin, CardType, MemoryStore, PgStore, QueryService, TransferEngine, TransferResponse,
    TransferStore,
};

const DB_MAX_CONNECTIONS: u32 = 10;

// ============================================================
// ARGUMENTS
// ============================================================

/// Flags that consume the following argument
const VALUE_FLAGS: [&str; 4] = ["--env", "-e", "--note", "--limit"];

fn get_flag(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn get_env() -> String {
    get_flag(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

/// Command and its positional arguments, flags removed
fn get_positionals() -> Vec<String> {
    let mut positionals = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
            continue;
        }
        positionals.push(arg);
    }
    positionals
}

fn arg<'a>(positionals: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    positionals
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument <{}>", name))
}

fn parse_id(raw: &str, name: &str) -> Result<i64> {
    raw.parse()
        .with_context(|| format!("<{}> must be an integer, got '{}'", name, raw))
}

/// Optional card type at `idx`, debit when absent
fn card_type_arg(positionals: &[String], idx: usize) -> Result<CardType> {
    match positionals.get(idx) {
        Some(raw) => raw.parse::<CardType>().map_err(|e| anyhow!(e)),
        None => Ok(CardType::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================
// SERVICES
// ============================================================

struct Services {
    engine: TransferEngine,
    query: QueryService,
    admin: CardAdmin,
}

impl Services {
    fn new<S: TransferStore + 'static>(store: Arc<S>, config: &TransferConfig) -> Self {
        Self {
            engine: TransferEngine::new(store.clone(), config),
            query: QueryService::new(store.clone(), config.clone()),
            admin: CardAdmin::new(store),
        }
    }
}

async fn connect(config: &AppConfig) -> Result<Database> {
    let url = config
        .postgres_url
        .as_deref()
        .context("postgres_url is not configured (set it in the config file or DATABASE_URL)")?;
    Database::connect(url, DB_MAX_CONNECTIONS)
        .await
        .context("Failed to connect to PostgreSQL")
}

// ============================================================
// COMMANDS
// ============================================================

/// Returns `false` when the command ran but reported a failure
async fn run(config: &AppConfig) -> Result<bool> {
    let positionals = get_positionals();
    let command = positionals
        .first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing command (try: init-db, issue, transfer, demo)"))?;

    if command == "demo" {
        return run_demo(&config.transfer).await;
    }

    let db = connect(config).await?;
    if command == "init-db" {
        db.init_schema().await.context("Failed to apply schema")?;
        print_json(&serde_json::json!({ "success": true, "message": "Schema ready" }))?;
        return Ok(true);
    }

    let services = Services::new(Arc::new(PgStore::from_database(&db)), &config.transfer);
    run_command(&services, command, &positionals[1..]).await
}

async fn run_command(services: &Services, command: &str, args: &[String]) -> Result<bool> {
    match command {
        "issue" => {
            let card_type = card_type_arg(args, 2)?;
            let card = services
                .admin
                .issue_card(
                    arg(args, 0, "phone")?,
                    arg(args, 1, "card_number")?,
                    card_type,
                )
                .await?;
            print_json(&card)?;
        }
        "top-up" => {
            let card_id = parse_id(arg(args, 0, "card_id")?, "card_id")?;
            let card = services
                .admin
                .top_up(card_id, arg(args, 1, "amount")?)
                .await?;
            print_json(&card)?;
        }
        "toggle-block" => {
            let card_id = parse_id(arg(args, 0, "card_id")?, "card_id")?;
            let blocked = services.admin.toggle_block(card_id).await?;
            print_json(&serde_json::json!({ "card_id": card_id, "blocked": blocked }))?;
        }
        "request-card" => {
            let request = services
                .admin
                .request_card(arg(args, 0, "phone")?)
                .await?;
            print_json(&request)?;
        }
        "requests" => {
            print_json(&services.admin.pending_requests().await?)?;
        }
        "approve" => {
            let request_id = parse_id(arg(args, 0, "request_id")?, "request_id")?;
            let card = services
                .admin
                .approve_request(
                    request_id,
                    arg(args, 1, "card_number")?,
                    card_type_arg(args, 2)?,
                )
                .await?;
            print_json(&card)?;
        }
        "cards" => {
            let owner = parse_id(arg(args, 0, "owner_id")?, "owner_id")?;
            print_json(&services.admin.cards_of(owner).await?)?;
        }
        "transfer" => {
            let note = get_flag(&["--note"]);
            let result = services
                .engine
                .transfer(
                    arg(args, 0, "from_card")?,
                    arg(args, 1, "to_card")?,
                    arg(args, 2, "amount")?,
                    note.as_deref(),
                )
                .await;
            return match result {
                Ok(record) => {
                    print_json(&TransferResponse::from(&record))?;
                    Ok(true)
                }
                Err(e) => {
                    print_json(&ErrorResponse::from(&e))?;
                    Ok(false)
                }
            };
        }
        "balance" => {
            let card_id = parse_id(arg(args, 0, "card_id")?, "card_id")?;
            let balance = services.query.balance(card_id).await?;
            print_json(&serde_json::json!({ "card_id": card_id, "balance": balance }))?;
        }
        "history" => {
            let card_id = parse_id(arg(args, 0, "card_id")?, "card_id")?;
            let limit = get_flag(&["--limit"])
                .map(|raw| raw.parse::<u32>())
                .transpose()
                .context("--limit must be a non-negative integer")?;
            print_json(&services.query.history(card_id, limit).await?)?;
        }
        other => bail!("unknown command '{}'", other),
    }
    Ok(true)
}

/// Walk through the transfer scenarios against a fresh in-memory store
async fn run_demo(config: &TransferConfig) -> Result<bool> {
    let store = Arc::new(MemoryStore::new());
    let services = Services::new(store.clone(), config);

    let a = services
        .admin
        .issue_card("+70000000001", "4000 0000 0000 0001", CardType::Debit)
        .await?;
    // The second card goes through the request/approve path
    let request = services.admin.request_card("+70000000002").await?;
    print_json(&services.admin.pending_requests().await?)?;
    let b = services
        .admin
        .approve_request(request.id, "4000 0000 0000 0002", CardType::Credit)
        .await?;
    services.admin.top_up(a.id, "100").await?;

    let attempts = [
        (a.card_number.as_str(), b.card_number.as_str(), "40", Some("rent")),
        (a.card_number.as_str(), b.card_number.as_str(), "100", None),
        (a.card_number.as_str(), a.card_number.as_str(), "1", None),
    ];
    for (from, to, amount, note) in attempts {
        match services.engine.transfer(from, to, amount, note).await {
            Ok(record) => print_json(&TransferResponse::from(&record))?,
            Err(e) => print_json(&ErrorResponse::from(&e))?,
        }
    }

    // Two concurrent transfers that cannot both fit in the remaining 60
    let (first, second) = tokio::join!(
        services
            .engine
            .transfer(&a.card_number, &b.card_number, "50", None),
        services
            .engine
            .transfer(&a.card_number, &b.card_number, "50", None),
    );
    for result in [first, second] {
        match result {
            Ok(record) => print_json(&TransferResponse::from(&record))?,
            Err(e) => print_json(&ErrorResponse::from(&e))?,
        }
    }

    print_json(&serde_json::json!({
        "balances": [
            { "card_id": a.id, "balance": services.query.balance(a.id).await? },
            { "card_id": b.id, "balance": services.query.balance(b.id).await? },
        ],
        "total": store.total_balance().await?,
    }))?;
    print_json(&services.query.history(a.id, None).await?)?;
    Ok(true)
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> ExitCode {
    let env = get_env();
    let app_config = match AppConfig::load(&env) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = cardledger::logging::init_logging(&app_config);

    tracing::info!("Starting cardledger in {} mode", env);

    match run(&app_config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("Command failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
