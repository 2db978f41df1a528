use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use push_core::{DeliveryOptions, Message, Priority, PushMessage, TokenCriteria};

#[derive(Parser, Debug)]
#[command(name = "push-server")]
#[command(about = "Push notification dispatch and registry maintenance", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run database migrations
    Migrate,

    /// Bulk import installations from a JSON file
    Import(ImportArgs),

    /// Send a notification to a variant's devices
    Send(SendArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[arg(long)]
    pub variant: String,

    /// JSON array of installations
    #[arg(long)]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[arg(long)]
    pub variant: String,

    /// Explicit device tokens or `/topics/<name>` targets; skips resolution
    #[arg(long)]
    pub target: Vec<String>,

    #[arg(long)]
    pub category: Vec<String>,

    #[arg(long)]
    pub alias: Vec<String>,

    #[arg(long)]
    pub device_type: Vec<String>,

    #[arg(long)]
    pub alert: String,

    #[arg(long)]
    pub sound: Option<String>,

    #[arg(long)]
    pub badge: Option<i32>,

    #[arg(long, value_enum, default_value_t = PriorityArg::Normal)]
    pub priority: PriorityArg,

    /// Time to live in seconds
    #[arg(long)]
    pub ttl: Option<i32>,

    /// Extra payload entries
    #[arg(long, value_parser = parse_key_value)]
    pub data: Vec<(String, String)>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityArg {
    Normal,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(priority: PriorityArg) -> Self {
        match priority {
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::High => Priority::High,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

impl SendArgs {
    pub fn push_message(&self) -> PushMessage {
        let mut message = Message::new()
            .with_alert(&self.alert)
            .with_priority(self.priority.into());

        if let Some(sound) = &self.sound {
            message = message.with_sound(sound);
        }
        if let Some(badge) = self.badge {
            message = message.with_badge(badge);
        }
        for (key, value) in &self.data {
            message = message.with_data(key, value.as_str());
        }

        let config = match self.ttl {
            Some(ttl) => DeliveryOptions::with_time_to_live(ttl),
            None => DeliveryOptions::default(),
        };

        PushMessage::new(message).with_config(config)
    }

    pub fn criteria(&self) -> TokenCriteria {
        TokenCriteria {
            categories: self.category.clone(),
            aliases: self.alias.clone(),
            device_types: self.device_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send_args(args: &[&str]) -> SendArgs {
        let cli = Cli::try_parse_from(["push-server", "send"].iter().chain(args)).unwrap();
        match cli.command {
            Commands::Send(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_send_args_build_message() {
        let args = send_args(&[
            "--variant", "android-1",
            "--alert", "hi",
            "--badge", "3",
            "--priority", "high",
            "--ttl", "60",
            "--data", "room=42",
            "--data", "url=https://x/?a=b",
        ]);

        let push = args.push_message();
        assert_eq!(push.message.alert.as_deref(), Some("hi"));
        assert_eq!(push.message.badge, Some(3));
        assert_eq!(push.message.priority, Priority::High);
        assert_eq!(push.config.time_to_live, 60);
        assert_eq!(push.message.user_data["room"], "42");
        assert_eq!(push.message.user_data["url"], "https://x/?a=b");
    }

    #[test]
    fn test_send_defaults() {
        let args = send_args(&["--variant", "v", "--alert", "hi", "--category", "news"]);

        let push = args.push_message();
        assert_eq!(push.message.priority, Priority::Normal);
        assert!(!push.config.has_time_to_live());
        assert_eq!(args.criteria(), TokenCriteria::new().with_category("news"));
        assert!(args.target.is_empty());
    }

    #[test]
    fn test_rejects_malformed_data() {
        let result = Cli::try_parse_from([
            "push-server", "send", "--variant", "v", "--alert", "a", "--data", "novalue",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["push-server", "migrate", "--config", "/tmp/p.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
        assert!(matches!(cli.command, Commands::Migrate));
    }
}
