//! market-runner: headless demo runner for the marketplace core.
//!
//! Usage:
//!   market-runner --seed 42 --amount 12000 --income 2500 --product personal-loan
//!   market-runner --seed 42 --sessions 25 --db market.db
//!
//! Generates a ranked offer table for the CLI-described applicant, then
//! simulates seeded demo tracking traffic and prints the metrics summary.

use anyhow::Result;
use chrono::Utc;
use finmarket_core::{
    applicant::{ApplicantProfile, CreditHistory, EmploymentType, ProductType, Urgency},
    clock::ManualClock,
    config::{MarketConfig, DEFAULT_OFFER_COUNT},
    offer_engine::{BankOffer, OfferEngine},
    rng::{MarketRng, RngBank, StreamSlot},
    storage::SqliteStore,
    tracking_store::{ActivityKind, DeviceKind, TrackingStore, VisitorStatus},
};
use std::env;

const APPLICANT_EMAIL: &str = "applicant@demo.example";

const DEMO_VISITORS: [&str; 8] = [
    "rivera@demo.example",
    "chen@demo.example",
    "okafor@demo.example",
    "lindqvist@demo.example",
    "tanaka@demo.example",
    "moreau@demo.example",
    "castillo@demo.example",
    "farrell@demo.example",
];

const ENTRY_METHODS: [&str; 4] = ["direct", "search", "ad", "email-link"];
const ENTRY_REASONS: [&str; 4] = ["compare rates", "first loan", "refinance", "browse"];
const DEMO_UPLOADS: [(&str, &str); 3] = [
    ("payslip.pdf", "pdf"),
    ("id-card.jpg", "jpg"),
    ("bank-statement.pdf", "pdf"),
];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let offer_count = parse_arg(&args, "--offers", DEFAULT_OFFER_COUNT);
    let demo_sessions = parse_arg(&args, "--sessions", 12usize);
    let income = parse_arg(&args, "--income", 2_500.0f64);
    let amount = parse_arg(&args, "--amount", 12_000.0f64);
    let product_arg = args
        .windows(2)
        .find(|w| w[0] == "--product")
        .map(|w| w[1].as_str())
        .unwrap_or("personal-loan");
    let credit_arg = args
        .windows(2)
        .find(|w| w[0] == "--credit")
        .map(|w| w[1].as_str())
        .unwrap_or("good");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let catalog = args
        .windows(2)
        .find(|w| w[0] == "--catalog")
        .map(|w| w[1].as_str());

    let product: ProductType = product_arg.parse()?;
    let credit: CreditHistory = credit_arg.parse()?;

    println!("Financial Marketplace — market-runner");
    println!("  seed:     {seed}");
    println!("  offers:   {offer_count}");
    println!("  sessions: {demo_sessions}");
    println!("  product:  {product}");
    println!("  amount:   {amount:.2}");
    println!("  income:   {income:.2}");
    println!("  db:       {db}");
    println!();

    let config = match catalog {
        Some(path) => {
            log::info!("loading institution catalog from {path}");
            MarketConfig::load(path)?
        }
        None => MarketConfig::builtin(),
    };

    let bank = RngBank::new(seed);
    let engine = OfferEngine::new(config);

    let applicant = ApplicantProfile {
        full_name:            "Demo Applicant".to_string(),
        national_id:          "D-0000-000".to_string(),
        email:                APPLICANT_EMAIL.to_string(),
        phone:                "+1 555 0100".to_string(),
        monthly_income:       income,
        requested_amount:     amount,
        product_type:         product,
        credit_history:       credit,
        employment_type:      EmploymentType::Salaried,
        has_existing_debt:    false,
        is_existing_customer: false,
        urgency:              Urgency::ThisMonth,
    };

    // For :memory: use a SQLite shared-memory URI so a reopened runner in
    // the same process (tests, future IPC) would see the same database.
    let db_effective: String = if db == ":memory:" {
        format!("file:marketrun_{}?mode=memory&cache=shared", epoch_secs())
    } else {
        db.to_string()
    };
    let storage = SqliteStore::open(&db_effective)?;

    let clock = ManualClock::starting_at(Utc::now());
    let mut tracking = TrackingStore::new(Box::new(storage), Box::new(clock.clone()));

    let mut offer_rng = bank.stream(StreamSlot::OfferEngine);
    let offers = run_applicant_flow(
        &engine,
        &applicant,
        offer_count,
        &mut offer_rng,
        &mut tracking,
        &clock,
    )?;
    print_offer_table(&offers);

    let mut demo_rng = bank.stream(StreamSlot::DemoTraffic);
    simulate_demo_traffic(
        &mut tracking,
        &clock,
        engine.config(),
        demo_sessions,
        &mut demo_rng,
    );

    print_tracking_summary(&tracking);
    Ok(())
}

/// One tracked applicant journey: browse, generate the comparison, select
/// the top-ranked offer.
fn run_applicant_flow(
    engine: &OfferEngine,
    applicant: &ApplicantProfile,
    offer_count: usize,
    rng: &mut MarketRng,
    tracking: &mut TrackingStore,
    clock: &ManualClock,
) -> Result<Vec<BankOffer>> {
    tracking.start_session(&applicant.email, DeviceKind::Desktop, "cli", "offer comparison");
    tracking.track_activity(
        ActivityKind::PageView,
        serde_json::json!({ "page": "landing" }),
        "Landing page",
    );
    clock.advance_secs(20);
    tracking.track_activity(
        ActivityKind::ProductView,
        serde_json::json!({ "product": applicant.product_type.as_str() }),
        &format!("Viewed {} comparison", applicant.product_type),
    );

    let offers = engine.generate_bank_offers(applicant, offer_count, rng)?;

    clock.advance_secs(15);
    tracking.track_activity(
        ActivityKind::OffersGenerated,
        serde_json::json!({
            "count": offers.len(),
            "product": applicant.product_type.as_str(),
            "amount": applicant.requested_amount,
        }),
        &format!("Generated {} offers", offers.len()),
    );

    if let Some(top) = offers.first() {
        clock.advance_secs(45);
        tracking.track_activity(
            ActivityKind::OfferSelected,
            serde_json::json!({
                "institution": top.institution,
                "product": top.product_name,
                "rank": top.rank,
            }),
            &format!("Selected {} offer", top.institution),
        );
    }

    clock.advance_secs(30);
    tracking.end_session();
    Ok(offers)
}

/// Seeded synthetic visitors: a small pool of returning emails browsing
/// products, occasionally uploading documents, completing or abandoning.
fn simulate_demo_traffic(
    tracking: &mut TrackingStore,
    clock: &ManualClock,
    config: &MarketConfig,
    sessions: usize,
    rng: &mut MarketRng,
) {
    for _ in 0..sessions {
        clock.advance_secs(600 + rng.next_u64_below(14_400) as i64);

        let email = DEMO_VISITORS[rng.next_u64_below(DEMO_VISITORS.len() as u64) as usize];
        let device = DeviceKind::ALL[rng.next_u64_below(3) as usize];
        let method = ENTRY_METHODS[rng.next_u64_below(ENTRY_METHODS.len() as u64) as usize];
        let reason = ENTRY_REASONS[rng.next_u64_below(ENTRY_REASONS.len() as u64) as usize];
        tracking.start_session(email, device, method, reason);

        tracking.track_activity(
            ActivityKind::PageView,
            serde_json::json!({ "page": "landing" }),
            "Landing page",
        );

        let views = 1 + rng.next_u64_below(3);
        for _ in 0..views {
            clock.advance_secs(10 + rng.next_u64_below(60) as i64);
            let inst =
                &config.institutions[rng.next_u64_below(config.institutions.len() as u64) as usize];
            let product = ProductType::ALL[rng.next_u64_below(5) as usize];
            let name = inst.products.for_type(product);
            tracking.track_activity(
                ActivityKind::ProductView,
                serde_json::json!({ "product": name, "institution": inst.name }),
                &format!("Viewed {name}"),
            );
        }

        if rng.chance(0.35) {
            clock.advance_secs(30 + rng.next_u64_below(120) as i64);
            let (file_name, file_kind) =
                DEMO_UPLOADS[rng.next_u64_below(DEMO_UPLOADS.len() as u64) as usize];
            tracking.track_file_upload(file_name, file_kind, 10_000 + rng.next_u64_below(90_000));
        }

        clock.advance_secs(30 + rng.next_u64_below(300) as i64);
        if rng.chance(0.4) {
            tracking.track_activity(
                ActivityKind::ProcessCompleted,
                serde_json::json!({}),
                "Finished application",
            );
            tracking.update_user_status(email, VisitorStatus::Converted, "completed application");
        } else if rng.chance(0.5) {
            tracking.track_activity(
                ActivityKind::ProcessAbandoned,
                serde_json::json!({}),
                "Left before finishing",
            );
        }

        tracking.end_session();
    }
}

fn print_offer_table(offers: &[BankOffer]) {
    println!("=== RANKED OFFERS ({}) ===", offers.len());
    for o in offers {
        println!(
            "  #{:<3} {:<24} {:<28} {:>5.1}%  {:>3} mo  {:>10.2}/mo  {:>12.2} total  score {:>5.1}  {:<6}  ~{}h",
            o.rank,
            o.institution,
            o.product_name,
            o.interest_rate,
            o.term_months,
            o.monthly_payment,
            o.total_repayment,
            o.score,
            o.approval_likelihood.as_str(),
            o.response_hours,
        );
    }
    println!();
}

fn print_tracking_summary(tracking: &TrackingStore) {
    let report = tracking.all_metrics();

    println!("=== TRACKING SUMMARY ===");
    println!("  sessions:     {}", report.total_sessions);
    println!("  activities:   {}", report.total_activities);
    println!("  visitors:     {}", report.total_users);
    println!("  files:        {}", report.total_files);
    println!("  events:       {}", report.total_events);
    println!("  avg duration: {:.0}s", report.avg_session_duration_secs);
    println!("  conversion:   {:.1}%", report.conversion_rate_pct);
    println!(
        "  devices:      desktop={} mobile={} tablet={}",
        report.devices.desktop, report.devices.mobile, report.devices.tablet
    );
    println!(
        "  statuses:     new={} active={} converted={} dormant={}",
        report.statuses.new,
        report.statuses.active,
        report.statuses.converted,
        report.statuses.dormant
    );

    println!();
    println!("=== TOP PRODUCTS ===");
    if report.top_products.is_empty() {
        println!("  (no product views recorded)");
    } else {
        for p in &report.top_products {
            println!("  {:<32} {} views", p.product, p.views);
        }
    }

    println!();
    println!("=== RECENT FEED ===");
    for item in report.recent_feed.iter().take(10) {
        println!("  {}  {}", item.at.format("%H:%M:%S"), item.label);
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn epoch_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
