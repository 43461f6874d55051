use std::sync::Arc;
use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use modest::host::page::SimulatedPage;
use modest::host::ScriptElement;
use modest::kernel::consent::FilePreferenceStore;
use modest::kernel::event::ActivityKind;
use modest::kernel::reactor::{self, Reactor};
use modest::services::collector::HttpTransport;
use modest::services::dispatch::{EffectDispatcher, Endpoints};
use modest::TrackerConfig;

const USAGE: &str = "usage: live_tracker <page-url> <site-token> [referrer]";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let mut args = std::env::args().skip(1);
    let page_url = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let site_token = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let referrer = args.next().unwrap_or_default();

    let config = TrackerConfig::from_env()?;
    config.validate()?;

    // 2. Setup Page + Preferences
    let page = Arc::new(
        SimulatedPage::new(&page_url)
            .with_referrer(&referrer)
            .with_script(ScriptElement::new(&config.script_src).with_data("token", &site_token)),
    );
    let origin = reqwest::Url::parse(&page_url)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_else(|_| "null".to_string());
    let prefs_path = std::env::var("MODEST_PREFS_PATH").unwrap_or_else(|_| ".modest-prefs.json".to_string());
    let store = Arc::new(FilePreferenceStore::open(prefs_path, origin));

    // 3. Setup Reactor + Channels
    let (tx, rx) = reactor::channel();
    page.attach(tx.clone());

    let mut reactor = match Reactor::boot(rx, config.clone(), page.as_ref(), store) {
        Ok(reactor) => reactor,
        Err(reason) => {
            tracing::info!("Tracking disabled: {:?}", reason);
            return Ok(());
        }
    };

    let transport = Arc::new(HttpTransport::new(config.request_timeout()));
    let dispatcher = EffectDispatcher::new(Endpoints::from(&config), transport, page.clone(), tx);

    // 4. Spawn Input Reader (Stdin)
    let console_page = page.clone();
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        println!("Commands: move | key | scroll | push <path> | replace <path> | back <path> | hide | show | optout | quit");
        console_page.document_ready();

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() { continue; }

            let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
            match cmd {
                "move" => console_page.input(ActivityKind::PointerMove),
                "key" => console_page.input(ActivityKind::KeyPress),
                "scroll" => console_page.input(ActivityKind::Scroll),
                "push" => console_page.push_state(arg.trim()),
                "replace" => console_page.replace_state(arg.trim()),
                "back" => console_page.pop_state(arg.trim()),
                "hide" => console_page.hide(),
                "show" => console_page.show(),
                "optout" => console_page.opt_out(),
                "quit" | "unload" => {
                    console_page.unload();
                    break;
                }
                other => println!("Unknown command '{}'", other),
            }
        }
        // stdin closed: treat as tab close
        console_page.unload();
    });

    // 5. Run Tracker
    reactor.run(&dispatcher).await;

    for element in page.elements() {
        println!("[DOM] #{}: {}", element.id, element.text);
    }
    Ok(())
}
