//! # Affiliate Console
//!
//! Terminal front end for the affiliate dashboard API: paginated lists,
//! stats and the admin/marketer mutations.

use std::path::PathBuf;
use std::sync::Arc;

use affiliate_console::{
    api::ApiClient,
    config::{AppConfig, ConfigLoader},
    list::Navigation,
    models::{
        AdminUser, Announcement, AnnouncementInput, AnnouncementPriority, AnnouncementStats,
        Notification, Payment, PaymentStats, TeamMember, TeamStats, UserStats, UserStatus,
    },
    mutation::MutationRequest,
    page::PageScope,
    query::{Collection, ListFilters},
    session::Session,
    table::{Presentation, TableAdapter, TableRow},
    telemetry::{self, TraceContext},
};
use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Serialize, de::DeserializeOwned};

#[derive(Parser)]
#[command(name = "affiliate-console", version, about = "Affiliate dashboard console")]
struct Cli {
    /// Directory holding the layered `.env` files
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and report which tokens the server issued
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Show one or more pages of a collection
    List(ListArgs),
    /// Show aggregate stats for a collection
    Stats {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
    },
    /// Review a payment
    Payment {
        action: PaymentAction,
        id: String,
        /// Reason recorded with a rejection
        #[arg(long)]
        reason: Option<String>,
    },
    /// Manage announcements
    Announcement {
        #[command(subcommand)]
        action: AnnouncementCommand,
    },
    /// Change or remove a user account
    User { action: UserAction, id: String },
    /// Notification actions
    Notification { action: NotificationAction, id: String },
    /// Print the effective configuration with secrets redacted
    Config,
}

#[derive(Args)]
struct ListArgs {
    #[arg(value_parser = parse_collection)]
    collection: Collection,
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    level: Option<u32>,
    #[arg(long = "type")]
    kind: Option<String>,
    #[arg(long)]
    priority: Option<String>,
    /// Page size; defaults to AFFILIATE_PAGE_SIZE
    #[arg(long)]
    limit: Option<u32>,
    /// Number of pages to walk forward
    #[arg(long, default_value_t = 1)]
    pages: u32,
    /// Render rows as cards instead of a table
    #[arg(long)]
    cards: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PaymentAction {
    Approve,
    Reject,
}

#[derive(Subcommand)]
enum AnnouncementCommand {
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long, value_enum, default_value = "medium")]
        priority: PriorityArg,
        #[arg(long = "type")]
        kind: Option<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PriorityArg {
    Low,
    Medium,
    High,
    Urgent,
}

impl From<PriorityArg> for AnnouncementPriority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => AnnouncementPriority::Low,
            PriorityArg::Medium => AnnouncementPriority::Medium,
            PriorityArg::High => AnnouncementPriority::High,
            PriorityArg::Urgent => AnnouncementPriority::Urgent,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum UserAction {
    Suspend,
    Activate,
    Delete,
}

#[derive(Clone, Copy, ValueEnum)]
enum NotificationAction {
    Read,
}

fn parse_collection(value: &str) -> Result<Collection, String> {
    Collection::from_name(value).ok_or_else(|| {
        let known: Vec<_> = Collection::ALL.iter().map(|c| c.name()).collect();
        format!("unknown collection `{value}` (expected one of: {})", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match cli.base_dir {
        Some(dir) => ConfigLoader::with_base_dir(dir),
        None => ConfigLoader::new(),
    };
    let config = loader.load().context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing telemetry")?;

    telemetry::with_trace_context(TraceContext::generate(), run(cli.command, config)).await
}

async fn run(command: Command, config: AppConfig) -> Result<()> {
    let session = Arc::new(Session::from_config(&config));
    let client = Arc::new(ApiClient::new(&config, Arc::clone(&session))?);

    match command {
        Command::Config => {
            println!("{}", config.redacted_json()?);
        }
        Command::Login { email, password } => {
            let user = client.login(&email, &password).await?;
            match user {
                Some(user) => println!("signed in as {} <{}>", user.name, user.email),
                None => println!("signed in"),
            }
            let summary = session.summary();
            println!(
                "access token: {}, refresh token: {}",
                issued(summary.authenticated),
                issued(summary.has_refresh_token)
            );
        }
        Command::List(args) => {
            let mut scope = PageScope::new(client, &config);
            if let Some(limit) = args.limit {
                scope = scope.with_page_size(limit);
            }
            show(&scope, &ListPlan::from(args)).await?;
        }
        Command::Stats { collection } => {
            let scope = PageScope::new(client, &config);
            match collection {
                Collection::AdminUsers => print_stats::<UserStats>(&scope, collection).await?,
                Collection::AdminPayments => {
                    print_stats::<PaymentStats>(&scope, collection).await?
                }
                Collection::AdminAnnouncements => {
                    print_stats::<AnnouncementStats>(&scope, collection).await?
                }
                Collection::Team => print_stats::<TeamStats>(&scope, collection).await?,
                Collection::Notifications => {
                    return Err(anyhow!("notifications have no stats endpoint"));
                }
            }
        }
        Command::Payment { action, id, reason } => {
            let request = match action {
                PaymentAction::Approve => MutationRequest::approve_payment(id),
                PaymentAction::Reject => MutationRequest::reject_payment(id, reason.as_deref()),
            };
            mutate(client, &config, request).await?;
        }
        Command::Announcement { action } => {
            let request = match action {
                AnnouncementCommand::Create {
                    title,
                    content,
                    priority,
                    kind,
                } => MutationRequest::create_announcement(&AnnouncementInput {
                    title,
                    content,
                    priority: priority.into(),
                    kind,
                })?,
                AnnouncementCommand::Delete { id } => MutationRequest::delete_announcement(id),
            };
            mutate(client, &config, request).await?;
        }
        Command::User { action, id } => {
            let request = match action {
                UserAction::Suspend => MutationRequest::set_user_status(id, UserStatus::Suspended),
                UserAction::Activate => MutationRequest::set_user_status(id, UserStatus::Active),
                UserAction::Delete => MutationRequest::delete_user(id),
            };
            mutate(client, &config, request).await?;
        }
        Command::Notification {
            action: NotificationAction::Read,
            id,
        } => {
            mutate(client, &config, MutationRequest::mark_notification_read(id)).await?;
        }
    }
    Ok(())
}

fn issued(present: bool) -> &'static str {
    if present { "issued" } else { "none" }
}

struct ListPlan {
    collection: Collection,
    filters: ListFilters,
    search: Option<String>,
    pages: u32,
    cards: bool,
}

impl ListPlan {
    fn first_page(collection: Collection) -> Self {
        Self {
            collection,
            filters: ListFilters::default(),
            search: None,
            pages: 1,
            cards: false,
        }
    }

    /// `status: pending, level: 2` for the filters and search in effect.
    fn active_filters(&self) -> Option<String> {
        let filters = self.filters.clone().normalized();
        let mut parts = Vec::new();
        if let Some(status) = &filters.status {
            parts.push(format!("status: {status}"));
        }
        if let Some(level) = filters.level {
            parts.push(format!("level: {level}"));
        }
        if let Some(kind) = &filters.kind {
            parts.push(format!("type: {kind}"));
        }
        if let Some(priority) = &filters.priority {
            parts.push(format!("priority: {priority}"));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            parts.push(format!("search: {search}"));
        }
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

impl From<ListArgs> for ListPlan {
    fn from(args: ListArgs) -> Self {
        Self {
            collection: args.collection,
            filters: ListFilters {
                status: args.status,
                level: args.level,
                kind: args.kind,
                priority: args.priority,
            },
            search: args.search,
            pages: args.pages.max(1),
            cards: args.cards,
        }
    }
}

async fn show(scope: &PageScope, plan: &ListPlan) -> Result<()> {
    match plan.collection {
        Collection::AdminUsers => list_pages::<AdminUser>(scope, plan).await,
        Collection::AdminPayments => list_pages::<Payment>(scope, plan).await,
        Collection::AdminAnnouncements => list_pages::<Announcement>(scope, plan).await,
        Collection::Team => list_pages::<TeamMember>(scope, plan).await,
        Collection::Notifications => list_pages::<Notification>(scope, plan).await,
    }
}

async fn list_pages<T>(scope: &PageScope, plan: &ListPlan) -> Result<()>
where
    T: TableRow + DeserializeOwned + Send + Sync + 'static,
{
    let list = scope.list::<T>(plan.collection);
    let mut view = list
        .set_criteria(plan.filters.clone(), plan.search.clone())
        .await;
    let presentation = if plan.cards {
        Presentation::Cards
    } else {
        Presentation::Table
    };

    for page in 1..=plan.pages {
        if let Some(err) = &view.error {
            return Err(anyhow!("{err} (page {page})"));
        }
        let mut table = TableAdapter::new(view.items(), T::columns())
            .with_empty_state(format!("No {} found.", plan.collection))
            .with_presentation(presentation)
            .server_side(list.server_side());
        if let Some(active) = plan.active_filters() {
            table = table.with_filter_slot(active);
        }
        println!("{}", table.render_titled());

        if page == plan.pages {
            break;
        }
        match list.next_page().await {
            Navigation::Loaded(next) => view = next,
            Navigation::Ignored => break,
        }
    }
    Ok(())
}

async fn print_stats<S>(scope: &PageScope, collection: Collection) -> Result<()>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let stats = scope.stats::<S>(collection).load().await?;
    println!("{}", serde_json::to_string_pretty(stats.as_ref())?);
    Ok(())
}

/// Run `request`, then show the first page of the collection it touched.
async fn mutate(
    client: Arc<ApiClient>,
    config: &AppConfig,
    request: MutationRequest,
) -> Result<()> {
    let scope = PageScope::new(client, config);
    let collection = request.collection;
    let summary = format!(
        "{} {} {}",
        request.op.as_str(),
        collection,
        request.entity_id.as_deref().unwrap_or_default()
    );
    scope.mutations().mutate(request).await?;
    println!("ok: {}", summary.trim_end());
    show(&scope, &ListPlan::first_page(collection)).await
}
