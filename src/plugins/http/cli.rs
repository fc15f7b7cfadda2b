use crate::plugins::transport::TransportContext;
use clap::{Arg, ArgAction, ArgMatches, Command};

/// Command-line options for the HTTP transport, shared by every subcommand.
pub struct HttpCliPlugin;

impl HttpCliPlugin {
    pub fn new() -> Self {
        Self
    }

    pub fn augment_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("http_header")
                .long("header")
                .help_heading("HTTP")
                .help("Extra HTTP header (repeatable), e.g. --header 'X-Request-Id: 42'")
                .action(ArgAction::Append)
                .num_args(1),
        )
        .arg(
            Arg::new("http_bearer_token")
                .long("bearer-token")
                .help_heading("HTTP")
                .help("Bearer token sent as the Authorization header")
                .num_args(1),
        )
        .arg(
            Arg::new("http_user_agent")
                .long("user-agent")
                .help_heading("HTTP")
                .help("HTTP User-Agent")
                .default_value("OrangeUploader/0.1")
                .num_args(1),
        )
        .arg(
            Arg::new("http_timeout_secs")
                .long("timeout-secs")
                .help_heading("HTTP")
                .help("Per-request timeout in seconds")
                .default_value("60")
                .num_args(1),
        )
    }

    pub fn apply_matches(&self, matches: &ArgMatches, ctx: &mut TransportContext) -> anyhow::Result<()> {
        if let Some(ua) = matches.get_one::<String>("http_user_agent") {
            ctx.user_agent = ua.clone();
        }
        if let Some(s) = matches.get_one::<String>("http_timeout_secs") {
            ctx.timeout_secs = s.parse()?;
        }
        if let Some(token) = matches.get_one::<String>("http_bearer_token") {
            ctx.bearer_token = Some(token.clone());
        }

        if let Some(values) = matches.get_many::<String>("http_header") {
            for h in values {
                let (k, v) = h
                    .split_once(':')
                    .ok_or_else(|| anyhow::anyhow!("invalid header format: {}", h))?;
                ctx.headers.insert(k.trim().to_string(), v.trim().to_string());
            }
        }

        Ok(())
    }
}

impl Default for HttpCliPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<TransportContext> {
        let plugin = HttpCliPlugin::new();
        let cmd = plugin.augment_command(Command::new("t"));
        let m = cmd.try_get_matches_from(args)?;
        let mut ctx = TransportContext::default();
        plugin.apply_matches(&m, &mut ctx)?;
        Ok(ctx)
    }

    #[test]
    fn headers_and_token_are_applied() {
        let ctx = parse(&[
            "t",
            "--header",
            "X-A: 1",
            "--bearer-token",
            "tok",
            "--timeout-secs",
            "5",
        ])
        .unwrap();
        assert_eq!(ctx.headers.get("X-A").map(String::as_str), Some("1"));
        assert_eq!(ctx.bearer_token.as_deref(), Some("tok"));
        assert_eq!(ctx.timeout_secs, 5);
    }

    #[test]
    fn header_without_colon_is_rejected() {
        assert!(parse(&["t", "--header", "nocolon"]).is_err());
    }
}
