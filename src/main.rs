use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use meditrack::{
    appsettings,
    cli::{Command, HELP_TEXT, suggest_medicines},
    delivery::{
        Notifier, NotificationWorker, ReminderDeliveryChannel, SoundChannel,
        SystemNotificationChannel, ToastChannel,
    },
    models::user::User,
    scheduling::SystemClock,
    session::{Session, SessionDependencies},
    sms::{HttpSmsDispatcher, SmsDispatcher, SmsRequester},
    storage::{
        local_cache::FileLocalCache,
        remote::{HttpRemoteCollection, RemoteCollection},
    },
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "meditrack", version, about = "Medication reminders in the terminal")]
struct Args {
    /// Username, or the provider uid together with `--federated`.
    #[arg(long, env = "MEDITRACK_USER")]
    user: String,

    /// Display name for federated accounts.
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    federated: bool,

    /// Extra settings file layered over appsettings.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let settings = appsettings::load(args.config.as_deref()).context("Failed to load settings")?;

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| settings.log_level.clone());
    pretty_env_logger::formatted_builder()
        .parse_filters(&log_filter)
        .init();

    log::info!(
        "Starting MediTrack. [timezone = {}, sms = {}, remote = {}]",
        settings.scheduler.timezone,
        settings.sms.is_some(),
        settings.remote.is_some()
    );

    let worker = NotificationWorker::start();
    let (toasts, mut toast_display) = ToastChannel::create();
    let channels: Vec<Arc<dyn ReminderDeliveryChannel>> = vec![
        Arc::new(toasts),
        Arc::new(SoundChannel::new(settings.notifications.sound)),
        Arc::new(SystemNotificationChannel::new(
            settings.notifications.enabled,
            worker.handle(),
        )),
    ];
    let notifier = Arc::new(Notifier::new(channels));

    tokio::spawn(async move {
        while let Some(toast) = toast_display.recv().await {
            println!("{toast}");
        }
    });

    let dispatcher = match &settings.sms {
        Some(sms) => {
            let dispatcher = HttpSmsDispatcher::new(sms.base_url.clone(), sms.timeout())
                .context("Failed to build SMS client")?;
            Some(Arc::new(dispatcher) as Arc<dyn SmsDispatcher>)
        }
        None => None,
    };
    let remote = match &settings.remote {
        Some(remote) => {
            let collection = HttpRemoteCollection::new(remote.base_url.clone(), remote.timeout())
                .context("Failed to build remote collection client")?;
            Some(Arc::new(collection) as Arc<dyn RemoteCollection>)
        }
        None => None,
    };

    let user = if args.federated {
        User::federated(args.user, args.name.unwrap_or_default())
    } else {
        User::local(args.user)
    };

    let session = Session::sign_in(
        user,
        SessionDependencies {
            local_cache: Arc::new(FileLocalCache::new(settings.storage.cache_dir.clone())),
            remote,
            clock: Arc::new(SystemClock::new(settings.scheduler.timezone)),
            sms: SmsRequester::new(dispatcher, Arc::clone(&notifier)),
            notifier,
        },
    )
    .await;
    println!("Welcome {}", session.user());
    println!("{HELP_TEXT}");

    let result = run_prompt(&session).await;

    session.sign_out().await;
    worker.shutdown();
    println!("Signed out");

    result
}

async fn run_prompt(session: &Session) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read command")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(Command::Logout) => return Ok(()),
            Ok(command) => {
                if let Err(error) = execute(session, command).await {
                    log::warn!("Command failed. [error = {:#}]", error);
                    println!("⚠️ {error:#}");
                }
            }
            Err(error) => println!("{error}"),
        }
    }
}

async fn execute(session: &Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Add(new_reminder) => match session.add_reminder(new_reminder).await {
            Ok(reminder) => println!("✅ Reminder added {reminder}"),
            Err(error) => println!("{error}"),
        },
        Command::List => {
            let reminders = session.reminders_newest_first().await;
            if reminders.is_empty() {
                println!("No reminders yet");
            }
            for reminder in reminders {
                println!("{reminder}");
            }
        }
        Command::Edit { id, update } => match session.edit_reminder(id, update).await {
            Some(reminder) => println!("✏️ Reminder updated {reminder}"),
            None => println!("No reminder with id {id}"),
        },
        Command::Remove(id) => match session.delete_reminder(id).await {
            Some(_) => println!("🗑️ Reminder removed"),
            None => println!("No reminder with id {id}"),
        },
        Command::Export(path) => {
            let export = session.export().await?;
            let path = path.unwrap_or_else(|| PathBuf::from(&export.file_name));
            tokio::fs::write(&path, export.contents)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported reminders to {}", path.display());
        }
        Command::Import(path) => {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let count = session.import(&contents).await?;
            println!("📥 Imported {count} reminders");
        }
        Command::SmsNow { phone, message } => {
            session.send_sms_now(&phone, &message).await?;
            println!("SMS sent");
        }
        Command::Meds(prefix) => {
            let suggestions = suggest_medicines(&prefix);
            if suggestions.is_empty() {
                println!("No matching medicines");
            } else {
                println!("{}", suggestions.join(", "));
            }
        }
        Command::Help => println!("{HELP_TEXT}"),
        Command::Logout => {}
    }

    Ok(())
}
