mod cli;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use nexus_crm::api::models::VerificationMethod;
use nexus_crm::api::{ApiClient, Notice};
use nexus_crm::app::AppState;
use nexus_crm::cache::QueryCache;
use nexus_crm::contracts::preview::{placeholders, segment, Run};
use nexus_crm::contracts::templates::{
    category_label, category_label_by_value, PublishFilter, TemplateQuery, TemplateSortField,
};
use nexus_crm::contracts::workflow::filter_contracts;
use nexus_crm::contracts::{ContractDesk, ContractFilter, ContractStatus};
use nexus_crm::inbox::{FolderSelection, InboxFilter, InboxView, Nexus, Page, SortOrder, UnifiedMessage};
use nexus_crm::storage::{apply_folder_layout, column_visible, ColumnSetting, FolderSetting, PreferenceStore};
use nexus_crm::ticker::{ElapsedClock, Ticker};
use nexus_crm::utils::{block_on, parse_date};
use nexus_crm::{Error, Result};

use cli::{
    Channel, Cli, ColumnCmd, Command, ConfigCmd, ContractCmd, FolderCmd, InboxArgs, PublishArg, SortArg, TemplateCmd,
};

/// Columns of the inbox list, in display order.
const INBOX_COLUMNS: [&str; 5] = ["flags", "date", "id", "title", "preview"];

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let mut state = AppState::load();

    match run(cli.command, &mut state) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", Notice::from_error("nexus", &e));
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, state: &mut AppState) -> Result<()> {
    match command {
        Command::Config(cmd) => config(cmd, state),
        Command::Inbox(args) => {
            let nexus = nexus(state)?;
            let view = inbox_view(&args, state.page_size)?;
            for n in block_on(nexus.refresh(view.folder())) {
                eprintln!("{n}");
            }
            print_page(&nexus.page(&view), &saved_columns());
            Ok(())
        }
        Command::Show { id, folder } => {
            let nexus = nexus(state)?;
            let folder: FolderSelection = folder.parse().unwrap_or_default();
            for n in block_on(nexus.refresh(&folder)) {
                eprintln!("{n}");
            }
            let panel = nexus
                .detail(&id, &folder)
                .ok_or_else(|| Error::validation(format!("no inbox item {id}")))?;
            println!("{panel}");
            Ok(())
        }
        Command::Watch { folder, interval } => watch(nexus(state)?, folder, interval, state.page_size),
        Command::Contracts(cmd) => contracts(cmd, state),
        Command::Templates(cmd) => templates(cmd, state),
        Command::Preview {
            category_id,
            country,
            sample,
        } => {
            let client = ApiClient::from_state(state)?;
            let text = block_on(client.docx_preview(category_id, &country, sample))?;
            for line in segment(&text) {
                let rendered: String = line
                    .iter()
                    .map(|run| match run {
                        Run::Text(t) => t.clone(),
                        Run::Placeholder(p) => format!("[{{{{{p}}}}}]"),
                        Run::Sample(s) => format!("[{s}]"),
                    })
                    .collect();
                println!("{rendered}");
            }
            let fields = placeholders(&text);
            if !fields.is_empty() {
                println!("\n{} placeholder(s): {}", fields.len(), fields.join(", "));
            }
            Ok(())
        }
        Command::Folders(cmd) => folders(cmd, state),
        Command::Columns(cmd) => columns(cmd),
    }
}

fn config(cmd: ConfigCmd, state: &mut AppState) -> Result<()> {
    match cmd {
        ConfigCmd::Show => {
            println!("base_url  = {}", state.base_url);
            println!("token     = {}", if state.token.is_some() { "(set)" } else { "(unset)" });
            println!("user_id   = {}", state.user_id.as_deref().unwrap_or("(unset)"));
            println!("page_size = {}", state.page_size);
            println!("mailbox   = {}", state.mailbox);
            if let Some(p) = AppState::toml_path() {
                println!("# {}", p.display());
            }
            Ok(())
        }
        ConfigCmd::Set {
            base_url,
            token,
            user_id,
            page_size,
            mailbox,
        } => {
            if let Some(v) = base_url {
                state.base_url = nexus_crm::utils::normalize_url(&v);
            }
            if let Some(v) = token {
                state.token = Some(v).filter(|t| !t.is_empty());
            }
            if let Some(v) = user_id {
                state.user_id = Some(v).filter(|u| !u.is_empty());
            }
            if let Some(v) = page_size {
                if v == 0 {
                    return Err(Error::validation("page size must be at least 1"));
                }
                state.page_size = v;
            }
            if let Some(v) = mailbox {
                state.mailbox = v;
            }
            state.save()?;
            println!("{}", Notice::info("Settings saved"));
            Ok(())
        }
    }
}

fn nexus(state: &AppState) -> Result<Nexus> {
    Ok(Nexus::new(ApiClient::from_state(state)?, QueryCache::new(), state.mailbox.clone()))
}

fn desk(state: &AppState) -> Result<ContractDesk> {
    Ok(ContractDesk::new(ApiClient::from_state(state)?, QueryCache::new()))
}

fn inbox_view(args: &InboxArgs, page_size: usize) -> Result<InboxView> {
    let mut view = InboxView::new(page_size);
    view.set_folder(args.folder.parse().unwrap_or_default());
    view.set_filter(InboxFilter {
        unread_only: args.unread,
        has_attachment: args.attachments,
        date_from: args.from.as_deref().map(parse_date).transpose()?,
        date_to: args.to.as_deref().map(parse_date).transpose()?,
        search: args.search.clone(),
    });
    if args.oldest {
        view.set_order(SortOrder::Oldest);
    }
    view.set_page(args.page.saturating_sub(1));
    Ok(view)
}

/// Column settings from the preference store; all columns when it cannot be read.
fn saved_columns() -> Vec<ColumnSetting> {
    PreferenceStore::open_default()
        .and_then(|store| store.column_visibility())
        .unwrap_or_else(|e| {
            log::warn!("column preferences unavailable: {e}");
            Vec::new()
        })
}

fn print_page(page: &Page<UnifiedMessage>, columns: &[ColumnSetting]) {
    for m in &page.items {
        let mut cells = Vec::new();
        for col in INBOX_COLUMNS.into_iter().filter(|c| column_visible(columns, c)) {
            let cell = match col {
                "flags" => format!(
                    "{}{}",
                    if m.unread { "*" } else { " " },
                    if m.has_attachments { "@" } else { " " }
                ),
                "date" => m
                    .timestamp
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".repeat(16)),
                "id" => format!("{:<14}", m.id),
                "title" => format!("{:<32}", m.title),
                _ => m.preview.chars().take(60).collect::<String>().replace('\n', " "),
            };
            cells.push(cell);
        }
        println!("{}", cells.join("  "));
    }
    println!("page {}/{} ({} items)", page.page + 1, page.total_pages, page.total);
}

fn watch(nexus: Nexus, folder: String, interval: u64, page_size: usize) -> Result<()> {
    let folder: FolderSelection = folder.parse().unwrap_or_default();
    let columns = saved_columns();
    block_on(async move {
        let clock = ElapsedClock::start();
        let ticker = Ticker::spawn(Duration::from_secs(interval.max(1)), move |n| {
            let nexus = nexus.clone();
            let folder = folder.clone();
            let columns = columns.clone();
            async move {
                for notice in nexus.refresh(&folder).await {
                    eprintln!("{notice}");
                }
                let mut view = InboxView::new(page_size);
                view.set_folder(folder);
                let page = nexus.page(&view);
                let unread: Vec<String> = nexus
                    .unread_counts()
                    .into_iter()
                    .map(|(kind, count)| format!("{kind}:{count}"))
                    .collect();
                println!("-- refresh #{n} [{}] --", unread.join(" "));
                print_page(&page, &columns);
            }
        });
        tokio::signal::ctrl_c().await?;
        ticker.stop();
        log::info!("watched for {}", clock.display());
        Ok::<(), Error>(())
    })
}

fn method(via: Channel) -> VerificationMethod {
    match via {
        Channel::Email => VerificationMethod::EmailOtp,
        Channel::Sms => VerificationMethod::SmsOtp,
    }
}

fn contracts(cmd: ContractCmd, state: &AppState) -> Result<()> {
    let desk = desk(state)?;
    let client = ApiClient::from_state(state)?;
    block_on(async move {
        match cmd {
            ContractCmd::List { status, search } => {
                let filter = ContractFilter {
                    status: status.as_deref().map(ContractStatus::parse_known).transpose()?,
                    search,
                };
                let rows = desk.rows().await?;
                for r in filter_contracts(&rows, &filter) {
                    let badge = r.contract.status.badge();
                    println!(
                        "{:<38} {:<16} {:<24} {} ({:?})",
                        r.contract.id,
                        r.contract.contract_number.as_deref().unwrap_or("-"),
                        r.customer_name.as_deref().unwrap_or("-"),
                        badge.label,
                        badge.variant,
                    );
                }
            }
            ContractCmd::Tally => {
                let t = desk.tally().await?;
                println!(
                    "total {}  draft {}  pending {}  signed {}  closed {}",
                    t.total, t.draft, t.pending, t.signed, t.closed
                );
            }
            ContractCmd::Send { id, via } => {
                let contract = client.contract(&id).await?;
                let result = desk.send(&contract, method(via)).await?;
                println!(
                    "{}",
                    Notice::info("Contract sent")
                        .with_description(format!("{} signer(s) notified", result.signature_requests.len()))
                );
            }
            ContractCmd::Resend { id, via } => {
                let contract = client.contract(&id).await?;
                let mut dialog = desk.open_signing(&contract).await?;
                if let Some(via) = via {
                    dialog.choose_method(method(via))?;
                }
                desk.resend_code(&mut dialog).await?;
                println!("{}", Notice::info("Verification code sent"));
            }
            ContractCmd::Sign { id, code, signature } => {
                let contract = client.contract(&id).await?;
                let mut dialog = desk.open_signing(&contract).await?;
                if !dialog.otp_verified() {
                    let code = code.ok_or_else(|| Error::validation("--code is required to verify the signer"))?;
                    desk.verify(&mut dialog, &code).await?;
                }
                dialog.set_signature(signature)?;
                desk.submit_signature(&mut dialog).await?;
                println!("{}", Notice::info("Contract signed"));
            }
            ContractCmd::Render { id } => {
                desk.render(&client.contract(&id).await?).await?;
                println!("{}", Notice::info("Contract rendered"));
            }
            ContractCmd::Regenerate { id } => {
                desk.regenerate(&client.contract(&id).await?).await?;
                println!("{}", Notice::info("Contract regenerated"));
            }
            ContractCmd::Cancel { id, reason } => {
                desk.cancel(&client.contract(&id).await?, &reason).await?;
                println!("{}", Notice::info("Contract cancelled"));
            }
        }
        Ok::<(), Error>(())
    })
}

fn templates(cmd: TemplateCmd, state: &AppState) -> Result<()> {
    let client = ApiClient::from_state(state)?;
    let desk = desk(state)?;
    block_on(async move {
        match cmd {
            TemplateCmd::List {
                country,
                category,
                publish,
                sort,
                desc,
                page,
            } => {
                let (templates, categories) = tokio::join!(client.templates(country.as_deref()), client.categories());
                let templates = templates?;
                let categories = categories.unwrap_or_default();
                let mut query = TemplateQuery::default();
                query.set_country(country.clone());
                query.set_category(category);
                query.set_publish(match publish {
                    PublishArg::All => PublishFilter::All,
                    PublishArg::Published => PublishFilter::Published,
                    PublishArg::Draft => PublishFilter::Draft,
                });
                let field = match sort {
                    SortArg::Name => TemplateSortField::Name,
                    SortArg::Country => TemplateSortField::Country,
                    SortArg::Category => TemplateSortField::Category,
                    SortArg::Status => TemplateSortField::Status,
                    SortArg::Date => TemplateSortField::Date,
                };
                query.sort_by(field);
                if desc {
                    query.sort_by(field);
                }
                query.page = page.saturating_sub(1);
                let (items, total_pages) = query.page(&templates);
                for t in items {
                    println!(
                        "{:<38} {:<32} {:<3} {:<36} {}",
                        t.id,
                        t.name,
                        t.country_code,
                        category_label_by_value(&categories, &t.category, Some(t.country_code.as_str())),
                        if t.is_published() { "published" } else { "draft" },
                    );
                }
                println!("page {}/{}", query.page.min(total_pages - 1) + 1, total_pages);
            }
            TemplateCmd::Categories { country } => {
                for c in client.categories().await? {
                    println!("{:>4} {:>3}  {:<16} {}", c.id, c.sort_order, c.value, category_label(&c, country.as_deref()));
                }
            }
            TemplateCmd::Reorder { active, over } => {
                let mut categories = client.categories().await?;
                if desk.reorder_categories(&mut categories, active, over).await? {
                    println!("{}", Notice::info("Category order saved"));
                } else {
                    println!("{}", Notice::info("Nothing to move"));
                }
            }
            TemplateCmd::Map { id } => {
                let template = desk.map_template_fields(&id).await?;
                let unmapped = template.placeholder_mappings.unmapped(template.extracted_fields.as_slice());
                println!(
                    "{}",
                    Notice::info("Fields mapped").with_description(format!(
                        "{} of {} mapped",
                        template.placeholder_mappings.mapped_count(),
                        template.extracted_fields.len()
                    ))
                );
                for field in &unmapped {
                    println!("  unmapped: {field}");
                }
            }
        }
        Ok::<(), Error>(())
    })
}

/// Saved setting for folder `id`, created visible at the end when missing.
fn folder_setting(layout: &mut Vec<FolderSetting>, id: String) -> &mut FolderSetting {
    let idx = match layout.iter().position(|s| s.id == id) {
        Some(i) => i,
        None => {
            let order = layout.len() as i32;
            layout.push(FolderSetting {
                id,
                visible: true,
                order,
            });
            layout.len() - 1
        }
    };
    &mut layout[idx]
}

fn folders(cmd: FolderCmd, state: &AppState) -> Result<()> {
    let store = PreferenceStore::open_default()?;
    let mut layout = store.folder_layout()?;
    match cmd {
        FolderCmd::List => {
            let all = block_on(nexus(state)?.folders())?;
            for f in apply_folder_layout(&all, &layout) {
                println!("{:<48} {:<24} {:>5} unread", f.id, f.display_name, f.unread_item_count);
            }
            return Ok(());
        }
        FolderCmd::Hide { id } => folder_setting(&mut layout, id).visible = false,
        FolderCmd::Unhide { id } => folder_setting(&mut layout, id).visible = true,
        FolderCmd::Order { id, position } => folder_setting(&mut layout, id).order = position,
    }
    store.set_folder_layout(&layout)?;
    println!("{}", Notice::info("Folder layout saved"));
    Ok(())
}

fn columns(cmd: ColumnCmd) -> Result<()> {
    let store = PreferenceStore::open_default()?;
    let mut settings = store.column_visibility()?;
    let (id, visible) = match cmd {
        ColumnCmd::List => {
            for col in INBOX_COLUMNS {
                let shown = if column_visible(&settings, col) { "shown" } else { "hidden" };
                println!("{col:<8} {shown}");
            }
            return Ok(());
        }
        ColumnCmd::Hide { id } => (id, false),
        ColumnCmd::Unhide { id } => (id, true),
    };
    if !INBOX_COLUMNS.contains(&id.as_str()) {
        return Err(Error::validation(format!(
            "unknown column {id}, expected one of {}",
            INBOX_COLUMNS.join(", ")
        )));
    }
    match settings.iter_mut().find(|c| c.id == id) {
        Some(c) => c.visible = visible,
        None => settings.push(ColumnSetting { id, visible }),
    }
    store.set_column_visibility(&settings)?;
    println!("{}", Notice::info("Column layout saved"));
    Ok(())
}
