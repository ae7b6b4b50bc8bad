use gmtilehist::{AnomalyEvent, AnomalyKind, Session};
use log::{error, info, warn};
use serde::Serialize;
use std::{fs, path::PathBuf, process};

#[derive(argh::FromArgs)]
/// Replays tile and instance placement from a GameMaker data archive room by
/// room, reporting structural anomalies as each entity is revealed.
struct Config {
    /// fail on data integrity problems instead of patching around them
    #[argh(switch, short = 's')]
    strict: bool,

    /// parse the archive synchronously (lower RAM usage)
    #[argh(switch, short = 't')]
    singlethread: bool,

    /// enable verbose logging. -v -v is more verbose.
    #[argh(switch, short = 'v')]
    verbose: u8,

    /// inspect a single room by its table index
    #[argh(option, short = 'r')]
    room: Option<i32>,

    /// inspect every room, in room order
    #[argh(switch, short = 'a')]
    all: bool,

    /// reveal rate in entities per second (default 30)
    #[argh(option, default = "30.0")]
    speed: f32,

    /// write a JSON report to this path
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// the archive to inspect
    #[argh(positional)]
    input: PathBuf,
}

#[derive(Serialize)]
struct ArchiveReport {
    name: String,
    version: String,
    rooms: Vec<RoomReport>,
}

#[derive(Serialize)]
struct RoomReport {
    room: i32,
    name: String,
    tiles: usize,
    objects: usize,
    anomalies: Vec<AnomalyRecord>,
}

#[derive(Serialize)]
struct AnomalyRecord {
    kind: AnomalyKind,
    index: usize,
    /// Name of the creation-code entry, for creation-code anomalies.
    code_entry: Option<String>,
}

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;

fn main() {
    process::exit(xmain());
}

fn xmain() -> i32 {
    let args: Config = argh::from_env();

    {
        let level = match args.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::new().filter_level(level).init();
    }

    if args.speed <= 0.0 {
        error!("--speed must be positive");
        return EXIT_FAILURE
    }

    let file = match fs::read(&args.input) {
        Ok(file) => file,
        Err(err) => {
            error!("failed to read '{}': {}", args.input.display(), err);
            return EXIT_FAILURE
        },
    };

    // A failed load leaves nothing behind: no session exists until the
    // archive decodes in full.
    let data = match gmwad::reader::from_wad(&file, args.strict, !args.singlethread) {
        Ok(data) => data,
        Err(err) => {
            error!("failed to load '{}' - {}", args.input.display(), err);
            return EXIT_FAILURE
        },
    };

    info!(
        "loaded '{}' (runner {}.{}.{}.{}, {} rooms)",
        data.name,
        data.version.major,
        data.version.minor,
        data.version.release,
        data.version.build,
        data.room_count(),
    );

    let rooms: Vec<i32> = if let Some(room) = args.room {
        vec![room]
    } else if args.all {
        if data.room_order.is_empty() { (0..data.room_count() as i32).collect() } else { data.room_order.clone() }
    } else {
        vec![data.room_order.first().copied().unwrap_or(0)]
    };

    let mut report = ArchiveReport {
        name: data.name.clone(),
        version: format!("{}.{}.{}.{}", data.version.major, data.version.minor, data.version.release, data.version.build),
        rooms: Vec::new(),
    };

    let mut session = Session::new(data);
    let mut config = session.config();
    config.animation_speed = args.speed;
    session.set_config(config);

    for room in rooms {
        match replay_room(&mut session, room) {
            Some(room_report) => report.rooms.push(room_report),
            None => warn!("room {} does not resolve, skipping", room),
        }
    }

    let total: usize = report.rooms.iter().map(|room| room.anomalies.len()).sum();
    info!("{} anomalies across {} room{}", total, report.rooms.len(), if report.rooms.len() == 1 { "" } else { "s" });

    if let Some(path) = &args.output {
        let out = match fs::File::create(path) {
            Ok(out) => out,
            Err(err) => {
                error!("failed to create report file '{}': {}", path.display(), err);
                return EXIT_FAILURE
            },
        };
        if let Err(err) = serde_json::to_writer_pretty(out, &report) {
            error!("failed to write report: {}", err);
            return EXIT_FAILURE
        }
        info!("wrote report to '{}'", path.display());
    }

    EXIT_SUCCESS
}

const TICK: f64 = 1.0 / 60.0;

/// Replays one room's reveal animation headlessly, collecting anomalies as
/// they fire.
fn replay_room(session: &mut Session, room_id: i32) -> Option<RoomReport> {
    if !session.select_room(room_id) {
        return None
    }
    let name = session.data().room(room_id).map(|room| room.name.clone()).unwrap_or_default();
    info!(
        "room {} '{}': {} tiles, {} instances",
        room_id,
        name,
        session.cache().tiles.len(),
        session.cache().objects.len(),
    );

    let mut anomalies = Vec::new();
    session.start_animation(true);
    while session.is_animating() {
        // New events land at the tail, so everything past the pre-step length
        // is this frame's crop; collect it before the decay clock runs.
        let seen = session.event_log().len();
        session.step_animation(TICK);
        for event in session.event_log().iter().skip(seen) {
            let code_entry = code_entry_name(session, event);
            match &code_entry {
                Some(code) => info!(" ! {} at entity {} ({})", event.kind, event.index, code),
                None => info!(" ! {} at entity {}", event.kind, event.index),
            }
            anomalies.push(AnomalyRecord { kind: event.kind, index: event.index, code_entry });
        }
        session.tick(TICK);
    }

    Some(RoomReport {
        room: room_id,
        name,
        tiles: session.cache().tiles.len(),
        objects: session.cache().objects.len(),
        anomalies,
    })
}

/// Names the code entry behind a creation-code anomaly, the way the overlay
/// displays it.
fn code_entry_name(session: &Session, event: &AnomalyEvent) -> Option<String> {
    if event.kind != AnomalyKind::CreationCode {
        return None
    }
    let cache = session.cache();
    let object_index = event.index.checked_sub(cache.tiles.len())?;
    let instance = cache.objects.get(object_index)?.record;
    let id = if instance.pre_create_code_id > 0 { instance.pre_create_code_id } else { instance.creation_code_id };
    session.data().code_name(id).map(str::to_owned)
}
