use cuebridge::{
    discovery::ServiceAdvert,
    executor::EngineCommand,
    model::{
        ShowModel,
        cue::{Cue, CueKind, Rgb},
        layout::Layout,
    },
    settings::BridgeSettings,
    start_bridge,
};

fn demo_show(name: &str) -> ShowModel {
    let mut intro = Cue::new("House to half", CueKind::VolumeControl);
    intro.duration_ms = 5_000;
    let mut music = Cue::new("Preshow music", CueKind::Media);
    music.duration_ms = 184_000;
    music.color = Some(Rgb(0, 180, 40));
    let mut speech = Cue::new("Welcome speech", CueKind::Memo);
    speech.notes = "Wait for the host to reach the lectern.".to_string();
    let blackout = Cue::new("Blackout", CueKind::StopAll);

    let standby = intro.id;
    ShowModel {
        name: name.to_string(),
        cues: vec![intro, music, speech, blackout],
        layout: Layout::List { standby: Some(standby) },
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let settings = BridgeSettings::load()?;
    log::info!("Starting with {:?}", settings);

    let (bridge, mut engine_rx) = start_bridge(&settings).await;
    bridge
        .model_manager
        .replace(demo_show(&settings.workspace_name))
        .await;
    let session_id = bridge.open_session(&settings.workspace_name).await;

    let server = bridge.bind(&settings.bind_addr()).await?;
    let local = server.local_addr()?;
    if settings.service_announcement {
        let advert = ServiceAdvert::for_lan(&settings.workspace_name, local.port());
        log::info!(
            "Service record: {} at {}:{}",
            advert.instance_name,
            advert.address,
            advert.port
        );
    }

    // Stand-in for the host engine: acknowledge and log.
    tokio::spawn(async move {
        while let Some(command) = engine_rx.recv().await {
            match command {
                EngineCommand::Start(id) => log::info!("Engine: start {}", id),
                EngineCommand::Pause(id) => log::info!("Engine: pause {}", id),
                EngineCommand::Resume(id) => log::info!("Engine: resume {}", id),
                EngineCommand::Stop(id) => log::info!("Engine: stop {}", id),
                EngineCommand::Interrupt(id) => log::info!("Engine: interrupt {}", id),
            }
        }
    });

    log::info!("Workspace {} ready on {}.", session_id, local);
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => log::info!("Shutting down."),
    }

    bridge.close_session().await;
    Ok(())
}
