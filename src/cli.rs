use clap::{Args, Parser, Subcommand, ValueEnum};

/// NEXUS CRM client: unified inbox and contract desk.
#[derive(Parser, Debug)]
#[command(name = "nexus", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show or change the stored connection settings.
    #[command(subcommand)]
    Config(ConfigCmd),
    /// List one page of the unified inbox.
    Inbox(InboxArgs),
    /// Show the detail panel of one inbox row, e.g. `email-42`.
    Show {
        id: String,
        #[arg(long, default_value = "all")]
        folder: String,
    },
    /// Refresh the inbox on a fixed interval until interrupted.
    Watch {
        #[arg(long, default_value = "all")]
        folder: String,
        /// Seconds between refreshes.
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
    #[command(subcommand)]
    Contracts(ContractCmd),
    #[command(subcommand)]
    Templates(TemplateCmd),
    /// Print a category's default template with placeholders marked.
    Preview {
        category_id: i64,
        country: String,
        /// Fill placeholders with sample data.
        #[arg(long)]
        sample: bool,
    },
    /// Mail folder visibility and ordering.
    #[command(subcommand)]
    Folders(FolderCmd),
    /// Which inbox list columns are shown.
    #[command(subcommand)]
    Columns(ColumnCmd),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
    Show,
    Set {
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        page_size: Option<usize>,
        #[arg(long)]
        mailbox: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct InboxArgs {
    /// all, unread, tasks, chat, sms, or a mail folder id.
    #[arg(long, default_value = "all")]
    pub folder: String,
    #[arg(long)]
    pub unread: bool,
    #[arg(long)]
    pub attachments: bool,
    /// First day to include (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<String>,
    /// Last day to include (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub oldest: bool,
    /// 1-based page number.
    #[arg(long, default_value_t = 1)]
    pub page: usize,
}

#[derive(Subcommand, Debug)]
pub enum ContractCmd {
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Counts per dashboard bucket.
    Tally,
    /// Send a draft out for signature.
    Send {
        id: String,
        #[arg(long, value_enum, default_value_t = Channel::Email)]
        via: Channel,
    },
    /// Deliver a new one-time code for the pending signature request.
    Resend {
        id: String,
        #[arg(long, value_enum)]
        via: Option<Channel>,
    },
    /// Verify the one-time code and sign.
    Sign {
        id: String,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        signature: String,
    },
    Render { id: String },
    Regenerate { id: String },
    Cancel {
        id: String,
        #[arg(long)]
        reason: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Email,
    Sms,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCmd {
    List {
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_enum, default_value_t = PublishArg::All)]
        publish: PublishArg,
        #[arg(long, value_enum, default_value_t = SortArg::Name)]
        sort: SortArg,
        #[arg(long)]
        desc: bool,
        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Categories with their label for a country.
    Categories {
        #[arg(long)]
        country: Option<String>,
    },
    /// Move category `active` to the position of `over`.
    Reorder { active: i64, over: i64 },
    /// Ask the AI service to map a template's extracted fields.
    Map { id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishArg {
    All,
    Published,
    Draft,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortArg {
    Name,
    Country,
    Category,
    Status,
    Date,
}

#[derive(Subcommand, Debug)]
pub enum FolderCmd {
    /// Folders of the configured mailbox in saved order.
    List,
    Hide { id: String },
    Unhide { id: String },
    /// Set the display position of a folder.
    Order { id: String, position: i32 },
}

#[derive(Subcommand, Debug)]
pub enum ColumnCmd {
    List,
    Hide { id: String },
    Unhide { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inbox_flags() {
        let cli = Cli::try_parse_from(["nexus", "inbox", "--folder", "unread", "--from", "2024-05-01", "--page", "2"])
            .unwrap();
        match cli.command {
            Command::Inbox(args) => {
                assert_eq!(args.folder, "unread");
                assert_eq!(args.from.as_deref(), Some("2024-05-01"));
                assert_eq!(args.page, 2);
                assert!(!args.oldest);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sign_requires_signature() {
        assert!(Cli::try_parse_from(["nexus", "contracts", "sign", "c1", "--code", "123456"]).is_err());
        let cli = Cli::try_parse_from(["nexus", "contracts", "send", "c1", "--via", "sms"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Contracts(ContractCmd::Send { via: Channel::Sms, .. })
        ));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
