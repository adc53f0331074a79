use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aula::api::{HttpSchoolApi, SchoolApi};
use aula::attendance::attendance_rate;
use aula::capacity::CapacityGuard;
use aula::config::AppConfig;
use aula::live::{ConnectionManager, LiveSession, Notice, SessionTracker, WsConnector};
use aula::models::{AttendanceStatus, MemberId, Relation};
use aula::roster::{self, MembershipMap};
use aula::scope::ViewScope;
use aula::services::{AttendanceService, GuardianLinks, MembershipSync, RosterService, SyncReport};

#[derive(Parser)]
#[command(name = "aula")]
#[command(about = "School administration client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum RelationArg {
    Students,
    Subjects,
}

impl From<RelationArg> for Relation {
    fn from(arg: RelationArg) -> Self {
        match arg {
            RelationArg::Students => Relation::Students,
            RelationArg::Subjects => Relation::Subjects,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show unassigned and assigned members with per-paralelo occupancy
    Roster {
        #[arg(long, value_enum, default_value = "students")]
        relation: RelationArg,
        /// Only list members whose name contains this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Make a paralelo's membership exactly the given ids
    Sync {
        #[arg(long, value_enum, default_value = "students")]
        relation: RelationArg,
        #[arg(long)]
        paralelo: i64,
        #[arg(long, value_delimiter = ',')]
        ids: Vec<MemberId>,
        /// Use the single server-side replace call instead of per-id calls
        #[arg(long)]
        replace: bool,
    },
    /// Add the given members to a paralelo
    Assign {
        #[arg(long, value_enum, default_value = "students")]
        relation: RelationArg,
        #[arg(long)]
        paralelo: i64,
        #[arg(long, value_delimiter = ',')]
        ids: Vec<MemberId>,
    },
    /// Make a parent's linked students exactly the given ids
    LinkParents {
        #[arg(long)]
        padre: i64,
        #[arg(long, value_delimiter = ',')]
        students: Vec<MemberId>,
    },
    /// Review or take attendance for a paralelo
    Attendance {
        #[arg(long)]
        paralelo: Option<i64>,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        mark_all: Option<AttendanceStatus>,
        /// `student_id=status`, repeatable
        #[arg(long = "set", value_parser = parse_mark)]
        marks: Vec<(i64, AttendanceStatus)>,
        #[arg(long)]
        save: bool,
        /// List recorded sheets instead
        #[arg(long)]
        history: bool,
    },
    /// Print badge scans and attendance notices until interrupted
    Watch,
    /// Wait for one unknown badge and print its id
    Capture {
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },
    /// Follow the WhatsApp bridge session, or end it
    Whatsapp {
        #[arg(long)]
        logout: bool,
    },
}

fn parse_mark(raw: &str) -> Result<(i64, AttendanceStatus), String> {
    let (id, status) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected student_id=status, got {}", raw))?;
    let id = id
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("bad student id {}: {}", id, e))?;
    Ok((id, status.parse::<AttendanceStatus>()?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "aula=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::new_from_env()?;
    let http = Arc::new(HttpSchoolApi::new(&config)?);
    let api: Arc<dyn SchoolApi> = http.clone();
    let guard = CapacityGuard::new(config.group_capacity);

    match cli.command {
        Commands::Roster { relation, search } => {
            let snapshot = RosterService::new(api)
                .load(relation.into(), &ViewScope::new())
                .await?
                .ok_or("view closed while loading")?;
            let parts = snapshot.partition();

            let term = search.unwrap_or_default();
            println!("Unassigned:");
            for member in roster::filter_by_name(&parts.unassigned, &term) {
                println!("  {:>5}  {}", member.id, member.name);
            }
            println!("Assigned:");
            for entry in &parts.assigned {
                if roster::filter_by_name(std::slice::from_ref(&entry.member), &term).is_empty() {
                    continue;
                }
                println!("  {:>5}  {}  [{}]", entry.member.id, entry.member.name, entry.group_label);
            }
            if !parts.conflicted.is_empty() {
                println!("In more than one paralelo:");
                for conflict in &parts.conflicted {
                    println!("  {:>5}  {}  {:?}", conflict.member.id, conflict.member.name, conflict.group_ids);
                }
            }
            println!("Paralelos:");
            for choice in snapshot.choices(&guard, 0) {
                println!("  {}  {}%", choice.display(), guard.occupancy_percent(choice.current));
            }
            if !snapshot.is_complete() {
                warn!("Membership missing for paralelos {:?}", snapshot.failed_groups);
            }
        }
        Commands::Sync {
            relation,
            paralelo,
            ids,
            replace,
        } => {
            let desired: BTreeSet<MemberId> = ids.into_iter().collect();
            let sync = MembershipSync::new(api, guard);
            if replace {
                let members = sync.replace(relation.into(), paralelo, &desired).await?;
                println!("Paralelo {} now has {} members", paralelo, members.len());
            } else {
                let report = sync.sync(relation.into(), paralelo, &desired).await?;
                print_report(&report);
            }
        }
        Commands::Assign {
            relation,
            paralelo,
            ids,
        } => {
            let relation: Relation = relation.into();
            let mut memberships = MembershipMap::new();
            for p in api.fetch_paralelos().await? {
                let members = api.fetch_members(relation, p.id).await?;
                memberships.insert_paralelo(&p, members);
            }
            let report = MembershipSync::new(api, guard)
                .assign_selected(relation, paralelo, &ids, &memberships)
                .await;
            print_report(&report);
        }
        Commands::LinkParents { padre, students } => {
            let desired: BTreeSet<MemberId> = students.into_iter().collect();
            let report = GuardianLinks::new(api).sync_parent(padre, &desired).await?;
            print_report(&report);
        }
        Commands::Attendance {
            paralelo,
            date,
            mark_all,
            marks,
            save,
            history,
        } => {
            let service = AttendanceService::new(api);
            if history {
                for record in service.history().await? {
                    println!(
                        "{}  {:<8}  {}/{} present",
                        record.date, record.parallel, record.present_count, record.total_students
                    );
                }
                return Ok(());
            }

            let paralelo = paralelo.ok_or("--paralelo is required")?;
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            let mut buffer = service.open(date, paralelo).await?;
            if let Some(status) = mark_all {
                buffer.mark_all(status);
            }
            for (student_id, status) in marks {
                buffer.set_status(student_id, status)?;
            }

            for entry in buffer.entries() {
                println!("  {:>5}  {:<30}  {}", entry.id, entry.name, entry.status);
            }
            let counts = buffer.counts();
            println!(
                "present {}  absent {}  late {}  excused {}  ({}%)",
                counts.present,
                counts.absent,
                counts.late,
                counts.excused,
                attendance_rate(&counts)
            );

            if save && buffer.is_dirty() {
                let message = service.save(&mut buffer).await?;
                println!("{}", message);
            }
        }
        Commands::Watch => {
            let manager = ConnectionManager::new(
                config.rfid_socket_url()?,
                Arc::new(WsConnector),
                config.reconnect,
            );
            let (tx, mut notices) = mpsc::unbounded_channel();
            let session = LiveSession::open(&manager, tx);
            info!("Watching {}", manager.url());
            loop {
                tokio::select! {
                    notice = notices.recv() => match notice {
                        Some(notice) => print_notice(&notice),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            session.close();
        }
        Commands::Capture { timeout_secs } => {
            let manager = ConnectionManager::new(
                config.rfid_socket_url()?,
                Arc::new(WsConnector),
                config.reconnect,
            );
            let (tx, mut notices) = mpsc::unbounded_channel();
            let session = LiveSession::open(&manager, tx);
            session.begin_capture();
            println!("Present a badge to the reader...");

            let wait = tokio::time::timeout(Duration::from_secs(timeout_secs), async {
                loop {
                    tokio::select! {
                        uid = session.wait_for_fill() => return uid,
                        Some(notice) = notices.recv() => print_notice(&notice),
                    }
                }
            });
            match wait.await {
                Ok(Some(uid)) => println!("{}", uid.to_uppercase()),
                Ok(None) => warn!("Capture ended without a badge"),
                Err(_) => warn!("No badge within {}s", timeout_secs),
            }
            session.close();
        }
        Commands::Whatsapp { logout } => {
            let socket_url = config.socket_url()?;
            if logout {
                http.whatsapp_logout(socket_url).await?;
                let mut tracker = SessionTracker::new();
                tracker.logged_out();
                println!("{}", tracker.state);
                return Ok(());
            }

            let manager = ConnectionManager::new(socket_url, Arc::new(WsConnector), config.reconnect);
            let lease = manager.acquire();
            let mut events = lease.subscribe();
            let mut tracker = SessionTracker::new();
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => {
                            if tracker.apply(&event) {
                                println!("{}", serde_json::to_string(&tracker)?);
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("{}", report.summary());
    if !report.skipped.is_empty() {
        println!("skipped: {:?}", report.skipped);
    }
    for failure in &report.failures {
        println!(
            "  {:?} {} failed{}: {}",
            failure.op,
            failure.member_id,
            if failure.retryable { " (retryable)" } else { "" },
            failure.error
        );
    }
}

fn print_notice(notice: &Notice) {
    println!("[{:?}] {}", notice.level, notice.message);
}
