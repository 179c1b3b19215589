use std::process::ExitCode;
use std::sync::Arc;

use collab_telemetry::{
    AuthUser, FileStore, HttpTransport, Interaction, Signal, SystemClock, Tracker, TrackerConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let config = match TrackerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let transport = match HttpTransport::from_config(&config) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "http client init failed");
            return ExitCode::FAILURE;
        }
    };
    let store = FileStore::new(config.state_dir.clone());
    let state_dir = store.dir().display().to_string();
    let tracker = Tracker::new(config, Arc::new(transport), Arc::new(store), Arc::new(SystemClock));

    info!(
        api_base_url = %tracker.config().api_base_url,
        %state_dir,
        "collab-telemetry starting"
    );
    if tracker.refresh_auth().await {
        tracker.start_session().await;
    } else {
        warn!("not signed in; use `login <user-id>` to start tracking");
    }

    run(&tracker).await;

    tracker.end_session().await;
    ExitCode::SUCCESS
}

/// Read commands from stdin until `quit`, EOF, or Ctrl-C.
async fn run(tracker: &Tracker) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                return;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle(tracker, line.trim()).await {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        return;
                    }
                }
            }
        }
    }
}

/// Apply one command. Returns `false` to stop.
async fn handle(tracker: &Tracker, line: &str) -> bool {
    let (command, arg) = line
        .split_once(' ')
        .map_or((line, ""), |(command, arg)| (command, arg.trim()));

    match command {
        "" => {}
        "click" => tracker.dispatch(Signal::Interaction(Interaction::Click)).await,
        "key" => tracker.dispatch(Signal::Interaction(Interaction::Key)).await,
        "scroll" => tracker.dispatch(Signal::Interaction(Interaction::Scroll)).await,
        "hide" => tracker.dispatch(Signal::Visibility(false)).await,
        "show" => tracker.dispatch(Signal::Visibility(true)).await,
        "offline" => tracker.dispatch(Signal::Connectivity(false)).await,
        "online" => tracker.dispatch(Signal::Connectivity(true)).await,
        "beat" => tracker.dispatch(Signal::Tick).await,
        "project" => {
            let (id, name) = arg
                .split_once(' ')
                .map_or((arg, None), |(id, name)| (id, Some(name.trim())));
            let outcome = tracker.track_project_open(id, name).await;
            info!(?outcome, project_id = id, "project opened");
        }
        "leave" => tracker.set_current_project(None).await,
        "page" => {
            let outcome = tracker.track_page_view(arg).await;
            info!(?outcome, page = arg, "page view");
        }
        "action" => {
            let outcome = tracker.track_action(arg, None).await;
            info!(?outcome, action = arg, "action");
        }
        "error" => {
            let outcome = tracker.track_error(arg, None).await;
            info!(?outcome, "error reported");
        }
        "login" if !arg.is_empty() => {
            tracker.login(AuthUser::new(arg)).await;
            tracker.start_session().await;
        }
        "logout" => tracker.logout().await,
        "end" => {
            tracker.end_session().await;
        }
        "status" => match tracker.current_session() {
            Some(info) => info!(
                session_id = %info.session_id,
                phase = %tracker.phase(),
                project = ?info.current_project_id,
                page = ?info.current_page,
                events = info.events,
                queued = tracker.backlog_len(),
                capacity = tracker.backlog_capacity(),
                evicted = tracker.backlog_evicted(),
                online = tracker.is_online(),
                visible = tracker.is_visible(),
                "status"
            ),
            None => info!(
                phase = %tracker.phase(),
                authenticated = tracker.is_authenticated(),
                queued = tracker.backlog_len(),
                evicted = tracker.backlog_evicted(),
                "status: no live session"
            ),
        },
        "quit" | "exit" => return false,
        other => warn!(command = other, "unknown command"),
    }
    true
}
