use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::Value;
use tracing::info;

use graffiti_federation::{FederationConfig, RemoteAndLocal, RemoteRouter};
use graffiti_protocol::{encode_component, ReqwestClient};
use graffiti_server::{GraffitiServer, ServerConfig};
use graffiti_store::{GraffitiStore, MemoryStore};
use graffiti_types::{
    GraffitiObject, GraffitiPatch, GraffitiStream, PutObject, Session, Step, StreamEntry,
};

use crate::cli::*;

/// Origin used when no federation config is given; matches the default
/// `serve` address.
const DEV_ORIGIN: &str = "remote:http://127.0.0.1:3000";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        config,
        actor,
        format,
        ..
    } = cli;
    let open = || Runner::open(config.as_deref(), actor.as_deref(), format.clone());
    match command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Get(args) => cmd_get(&open()?, args).await,
        Command::Put(args) => cmd_put(&open()?, args).await,
        Command::Patch(args) => cmd_patch(&open()?, args).await,
        Command::Delete(args) => cmd_delete(&open()?, args).await,
        Command::Discover(args) => cmd_discover(&open()?, args).await,
        Command::Orphans(args) => cmd_orphans(&open()?, args).await,
        Command::ChannelStats => cmd_channel_stats(&open()?).await,
    }
}

/// The store and session every client command runs against.
struct Runner {
    store: RemoteAndLocal,
    session: Option<Session>,
    format: OutputFormat,
}

impl Runner {
    fn open(
        config: Option<&Path>,
        actor: Option<&str>,
        format: OutputFormat,
    ) -> anyhow::Result<Self> {
        let config = match config {
            Some(path) => FederationConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => FederationConfig::new(DEV_ORIGIN),
        };
        let router = RemoteRouter::new(&config, Arc::new(ReqwestClient::new()))?;
        let store = RemoteAndLocal::new(
            Arc::new(MemoryStore::with_prefix(config.local_prefix.clone())),
            Arc::new(router),
        )
        .with_local_prefix(config.local_prefix.clone());

        let session = actor.map(|actor| {
            let http = ReqwestClient::new().with_bearer(encode_component(actor));
            Session::remote(actor, Arc::new(http))
        });
        Ok(Self {
            store,
            session,
            format,
        })
    }

    fn actor_session(&self) -> anyhow::Result<&Session> {
        match &self.session {
            Some(session) => Ok(session),
            None => bail!("this command needs an actor; pass --actor"),
        }
    }

    fn print_object(&self, object: &GraffitiObject) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(object)?),
            OutputFormat::Text if object.tombstone => {
                println!("{} {}", object.url.yellow(), "(deleted)".red());
            }
            OutputFormat::Text => {
                println!("{}", object.url.yellow().bold());
                println!("  Actor: {}", object.actor.cyan());
                println!("  Channels: {}", object.channels.join(", "));
                if let Some(allowed) = &object.allowed {
                    println!("  Allowed: {}", allowed.join(", "));
                }
                println!("  Last modified: {}", object.last_modified);
                println!("  Value: {}", object.value);
            }
        }
        Ok(())
    }

    /// Print each element and report error entries on stderr, returning the
    /// terminal value.
    async fn drain<T, R>(
        &self,
        stream: &mut dyn GraffitiStream<T, R>,
        mut print: impl FnMut(&Self, &T) -> anyhow::Result<()>,
    ) -> anyhow::Result<R> {
        loop {
            match stream.next().await? {
                Step::Yield(StreamEntry::Element(element)) => print(self, &element)?,
                Step::Yield(StreamEntry::Error { error, origin }) => {
                    eprintln!("{} {}: {}", "!".red().bold(), origin.bold(), error);
                }
                Step::Return(ret) => return Ok(ret),
            }
        }
    }
}

fn parse_json(label: &str, text: &str) -> anyhow::Result<Value> {
    serde_json::from_str(text).with_context(|| format!("{label} is not valid JSON"))
}

fn parse_operations<T: serde::de::DeserializeOwned>(
    label: &str,
    text: Option<&str>,
) -> anyhow::Result<Option<T>> {
    text.map(|t| serde_json::from_str(t).with_context(|| format!("{label} is not a JSON patch")))
        .transpose()
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.server_config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(origin) = args.origin {
        config.origin = origin;
    }
    config.validate()?;
    println!(
        "Graffiti origin {} on {}",
        config.origin.cyan(),
        config.bind_addr.to_string().bold()
    );
    GraffitiServer::new(config)?.serve().await?;
    Ok(())
}

async fn cmd_get(ctx: &Runner, args: GetArgs) -> anyhow::Result<()> {
    let schema = parse_json("schema", &args.schema)?;
    let object = ctx.store.get(&args.url, &schema, ctx.session.as_ref()).await?;
    ctx.print_object(&object)
}

async fn cmd_put(ctx: &Runner, args: PutArgs) -> anyhow::Result<()> {
    let session = ctx.actor_session()?;
    let mut object = PutObject::new(parse_json("value", &args.value)?, args.channels);
    if let Some(url) = args.url {
        object = object.with_url(url);
    }
    if let Some(allowed) = args.allowed {
        object = object.with_allowed(allowed);
    }
    let replacing = object.url.is_some();
    let stored = ctx.store.put(object, session).await?;
    info!(url = %stored.url, "put");
    if replacing {
        println!("{} Replaced {}", "✓".green().bold(), stored.url.yellow());
    } else {
        println!("{} Created {}", "✓".green().bold(), stored.url.yellow());
    }
    Ok(())
}

async fn cmd_patch(ctx: &Runner, args: PatchArgs) -> anyhow::Result<()> {
    let session = ctx.actor_session()?;
    let patch = GraffitiPatch {
        value: parse_operations("--value", args.value.as_deref())?,
        channels: parse_operations("--channels", args.channels.as_deref())?,
        allowed: parse_operations("--allowed", args.allowed.as_deref())?,
    };
    ctx.store.patch(&patch, &args.url, session).await?;
    println!("{} Patched {}", "✓".green().bold(), args.url.yellow());
    Ok(())
}

async fn cmd_delete(ctx: &Runner, args: DeleteArgs) -> anyhow::Result<()> {
    let session = ctx.actor_session()?;
    ctx.store.delete(&args.url, session).await?;
    println!("{} Deleted {}", "✓".green().bold(), args.url.yellow());
    Ok(())
}

async fn cmd_discover(ctx: &Runner, args: DiscoverArgs) -> anyhow::Result<()> {
    let session = ctx.session.as_ref();
    let mut stream = match &args.cursor {
        Some(cursor) => ctx.store.continue_object_stream(cursor, session).await?,
        None => {
            let schema = parse_json("schema", &args.schema)?;
            ctx.store.discover(&args.channels, &schema, session).await?
        }
    };
    let ret = ctx.drain(stream.as_mut(), Runner::print_object).await?;
    print_cursor(ctx, &ret.cursor);
    Ok(())
}

async fn cmd_orphans(ctx: &Runner, args: OrphansArgs) -> anyhow::Result<()> {
    let session = ctx.actor_session()?;
    let schema = parse_json("schema", &args.schema)?;
    let mut stream = ctx.store.recover_orphans(&schema, session).await?;
    let ret = ctx.drain(stream.as_mut(), Runner::print_object).await?;
    print_cursor(ctx, &ret.cursor);
    Ok(())
}

async fn cmd_channel_stats(ctx: &Runner) -> anyhow::Result<()> {
    let session = ctx.actor_session()?;
    let mut stream = ctx.store.channel_stats(session).await?;
    ctx.drain(stream.as_mut(), |ctx, stats| {
        match ctx.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(stats)?),
            OutputFormat::Text => println!(
                "{}  {} objects, last modified {}",
                stats.channel.bold(),
                stats.count,
                stats.last_modified
            ),
        }
        Ok(())
    })
    .await
}

fn print_cursor(ctx: &Runner, cursor: &str) {
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "cursor": cursor })),
        OutputFormat::Text => println!("\nCursor: {}", cursor.dimmed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn runner(actor: Option<&str>) -> Runner {
        Runner::open(None, actor, OutputFormat::Text).unwrap()
    }

    #[test]
    fn actor_flag_makes_a_remote_session() {
        let ctx = runner(Some("alice"));
        let session = ctx.actor_session().unwrap();
        assert_eq!(session.actor(), "alice");
        assert!(session.is_remote());
        assert!(runner(None).actor_session().is_err());
    }

    #[test]
    fn missing_config_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Runner::open(Some(&path), None, OutputFormat::Json).is_err());
    }

    #[test]
    fn patch_flags_parse_as_operations() {
        let patch = GraffitiPatch {
            value: parse_operations("--value", Some(r#"[{"op":"remove","path":"/a"}]"#)).unwrap(),
            channels: parse_operations("--channels", None).unwrap(),
            allowed: None,
        };
        assert_eq!(patch.value.map(|ops| ops.len()), Some(1));
        assert!(patch.channels.is_none());
        assert!(parse_operations::<Vec<Value>>("--value", Some("nope")).is_err());
    }

    #[tokio::test]
    async fn local_sessions_write_to_the_local_store() {
        let ctx = runner(None);
        let alice = Session::local("alice");
        let stored = ctx
            .store
            .put(PutObject::new(json!({"a": 1}), vec!["c".into()]), &alice)
            .await
            .unwrap();
        assert!(stored.url.starts_with("local:"));
        let got = ctx.store.get(&stored.url, &json!({}), Some(&alice)).await.unwrap();
        assert_eq!(got.value, json!({"a": 1}));
    }

    fn parse(args: &[&str]) -> Cli {
        use clap::Parser;
        Cli::try_parse_from(args).unwrap()
    }

    #[tokio::test]
    async fn serve_rejects_a_bad_origin_before_binding() {
        let cli = parse(&["graffiti", "serve", "--origin", "local:x", "--bind", "127.0.0.1:0"]);
        assert!(run_command(cli).await.is_err());
    }

    #[tokio::test]
    async fn client_commands_load_the_federation_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let path = path.to_str().unwrap();
        let cli = parse(&["graffiti", "--config", path, "get", "remote:pod.example/1"]);
        let err = run_command(cli).await.unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[tokio::test]
    async fn writes_without_an_actor_fail_locally() {
        let cli = parse(&["graffiti", "delete", "remote:pod.example/1"]);
        let err = run_command(cli).await.unwrap_err();
        assert!(err.to_string().contains("--actor"));
    }
}
