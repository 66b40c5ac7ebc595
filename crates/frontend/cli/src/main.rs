mod screenshot;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use retro_core::types::{CheatEntry, GameGeometry};
use retro_core::{compute_viewport, CoreBinding, MemoryRegion, ScalingPolicy};
use retro_libretro::{CoreDirectories, LibretroCore};
use retro_session::{
    JsonPreferences, NullSink, PersistenceManager, PreferenceStore, RomId, SaveSlot, Session,
    Settings, VirtualButton,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "retrofront", version, about = "Headless libretro front-end")]
struct Args {
    /// Settings file
    #[arg(long, global = true, default_value = "retrofront.json")]
    config: PathBuf,

    /// Override the data directory from the settings file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a ROM and run it for a number of frames
    Run {
        rom: PathBuf,

        /// libretro core to load (defaults to core_path in the settings)
        #[arg(long)]
        core: Option<PathBuf>,

        #[arg(long, default_value_t = 60)]
        frames: u64,

        /// Run as fast as possible instead of at the core's refresh rate
        #[arg(long, default_value_t = false)]
        unpaced: bool,

        /// Button held on port 0 for the whole run (repeatable)
        #[arg(long = "hold", value_parser = parse_button)]
        hold: Vec<VirtualButton>,

        /// Restore this slot (1-10) before running
        #[arg(long)]
        load_slot: Option<u8>,

        /// Save to this slot (1-10) after the last frame
        #[arg(long)]
        save_slot: Option<u8>,

        /// Write the last frame as a PNG
        #[arg(long)]
        screenshot: Option<PathBuf>,

        /// Display surface size as WIDTHxHEIGHT
        #[arg(long, default_value = "1280x720", value_parser = parse_size)]
        surface: (u32, u32),
    },

    /// Print the viewport for a framebuffer on a surface
    Viewport {
        /// Framebuffer size as WIDTHxHEIGHT
        #[arg(value_parser = parse_size)]
        base: (u32, u32),

        /// Surface size as WIDTHxHEIGHT
        #[arg(value_parser = parse_size)]
        surface: (u32, u32),

        /// fit-screen, maintain-aspect or pixel-perfect (defaults to the saved policy)
        #[arg(long, value_parser = parse_policy)]
        policy: Option<ScalingPolicy>,
    },

    /// Edit the stored cheat list of a ROM
    Cheats {
        /// ROM path or name
        rom: String,

        #[command(subcommand)]
        action: CheatAction,
    },

    /// List save-state slots of a ROM
    Slots {
        /// ROM path or name
        rom: String,
    },

    /// Show or change the saved scaling policy
    Policy {
        #[arg(value_parser = parse_policy)]
        set: Option<ScalingPolicy>,
    },

    /// Load a ROM and print what the core reports about it
    Info {
        rom: PathBuf,

        #[arg(long)]
        core: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CheatAction {
    List,
    Add {
        code: String,
        #[arg(default_value = "")]
        description: String,
        /// Store the cheat disabled
        #[arg(long, default_value_t = false)]
        disabled: bool,
    },
    Remove {
        index: usize,
    },
    Toggle {
        index: usize,
    },
}

fn parse_button(s: &str) -> Result<VirtualButton, String> {
    VirtualButton::from_name(s).ok_or_else(|| format!("unknown button '{}'", s))
}

fn parse_policy(s: &str) -> Result<ScalingPolicy, String> {
    ScalingPolicy::from_name(s).ok_or_else(|| format!("unknown scaling policy '{}'", s))
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w = w.trim().parse().map_err(|e| format!("bad width: {}", e))?;
    let h = h.trim().parse().map_err(|e| format!("bad height: {}", e))?;
    Ok((w, h))
}

fn parse_slot(n: u8) -> Result<SaveSlot> {
    SaveSlot::new(n).ok_or_else(|| anyhow!("slot must be between 1 and 10, got {}", n))
}

fn cheat_entry(code: String, description: String, enabled: bool) -> Result<CheatEntry> {
    if code.trim().is_empty() {
        bail!("cheat code must not be empty");
    }
    let mut entry = CheatEntry::new(code, description);
    entry.enabled = enabled;
    Ok(entry)
}

/// A ROM argument is either a path or a bare name; both map to the same id.
fn rom_id(rom: &str) -> RomId {
    RomId::from_locator(rom)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut settings = Settings::load(&args.config);
    if let Some(dir) = args.data_dir {
        settings.data_dir = dir;
    }
    log::debug!("data directory {}", settings.data_dir.display());

    match args.command {
        Command::Run {
            rom,
            core,
            frames,
            unpaced,
            hold,
            load_slot,
            save_slot,
            screenshot,
            surface,
        } => {
            let mut session = open_session(&settings, core.as_deref(), &rom)?;
            session.set_audio_enabled(settings.audio_enabled);
            session.surface_changed(surface.0, surface.1);

            if let Some(n) = load_slot {
                session.load_state(parse_slot(n)?)?;
                println!("Restored slot {}", n);
            }
            for button in &hold {
                session.press(0, *button);
            }

            let paced = settings.frame_pacing && !unpaced;
            for _ in 0..frames {
                if paced {
                    session.pace();
                }
                session.on_vsync();
            }

            let stats = session.stats();
            println!(
                "Ran {} frames ({} presented, {} duplicated, {} dropped, {} late)",
                stats.frames_run,
                stats.frames_presented,
                stats.frames_duplicated,
                stats.frames_dropped,
                stats.late_frames
            );
            if settings.audio_enabled {
                println!("Queued {} audio samples", session.sink().samples_queued);
            }
            if session.core().dropped_audio_samples() > 0 {
                log::warn!(
                    "{} audio samples dropped",
                    session.core().dropped_audio_samples()
                );
            }

            if let Some(path) = screenshot {
                let frame = session
                    .last_frame()
                    .ok_or_else(|| anyhow!("core produced no frame to capture"))?;
                screenshot::write_png(&path, frame)?;
                println!(
                    "Wrote {}x{} screenshot to {}",
                    frame.width,
                    frame.height,
                    path.display()
                );
            }

            if let Some(n) = save_slot {
                let bytes = session.save_state(parse_slot(n)?)?;
                println!("Saved {} bytes to slot {}", bytes, n);
            }

            session.teardown();
            settings.last_rom_path = Some(rom.display().to_string());
            if let Err(e) = settings.save(&args.config) {
                log::warn!("failed to save settings: {}", e);
            }
        }

        Command::Viewport {
            base,
            surface,
            policy,
        } => {
            let policy = match policy {
                Some(policy) => policy,
                None => JsonPreferences::open(settings.preferences_path()).scaling_policy(),
            };
            let geometry = GameGeometry {
                base_width: base.0,
                base_height: base.1,
                max_width: base.0,
                max_height: base.1,
                aspect_ratio: 0.0,
            };
            geometry.validate()?;
            let vp = compute_viewport(&geometry, surface.0, surface.1, policy);
            println!(
                "{}: {}x{} at ({}, {})",
                policy.name(),
                vp.width,
                vp.height,
                vp.x,
                vp.y
            );
        }

        Command::Cheats { rom, action } => {
            let pm = PersistenceManager::new(&settings.data_dir);
            let id = rom_id(&rom);
            let mut cheats = pm.load_cheats(&id);

            match action {
                CheatAction::List => {
                    if cheats.is_empty() {
                        println!("No cheats for {}", id);
                    }
                    for (i, cheat) in cheats.iter().enumerate() {
                        println!(
                            "{:>3} [{}] {} {}",
                            i,
                            if cheat.enabled { "x" } else { " " },
                            cheat.code,
                            cheat.description
                        );
                    }
                    return Ok(());
                }
                CheatAction::Add {
                    code,
                    description,
                    disabled,
                } => {
                    cheats.push(cheat_entry(code, description, !disabled)?);
                    println!("Added cheat {} for {}", cheats.len() - 1, id);
                }
                CheatAction::Remove { index } => {
                    if index >= cheats.len() {
                        bail!("{} has no cheat {}", id, index);
                    }
                    let removed = cheats.remove(index);
                    println!("Removed {}", removed.code);
                }
                CheatAction::Toggle { index } => {
                    let cheat = cheats
                        .get_mut(index)
                        .ok_or_else(|| anyhow!("{} has no cheat {}", id, index))?;
                    cheat.enabled = !cheat.enabled;
                    println!(
                        "{} is now {}",
                        cheat.code,
                        if cheat.enabled { "enabled" } else { "disabled" }
                    );
                }
            }
            pm.write_cheats(&id, &cheats)?;
        }

        Command::Slots { rom } => {
            let pm = PersistenceManager::new(&settings.data_dir);
            let id = rom_id(&rom);
            for info in pm.slot_info(&id) {
                match (info.size, info.modified) {
                    (Some(size), Some(modified)) => println!(
                        "slot {:>2}: {} bytes, {}",
                        info.slot.number(),
                        size,
                        modified.format("%Y-%m-%d %H:%M:%S")
                    ),
                    (Some(size), None) => println!("slot {:>2}: {} bytes", info.slot.number(), size),
                    _ => println!("slot {:>2}: empty", info.slot.number()),
                }
            }
        }

        Command::Policy { set } => {
            let mut prefs = JsonPreferences::open(settings.preferences_path());
            if let Some(policy) = set {
                prefs.set_scaling_policy(policy)?;
            }
            println!("{}", prefs.scaling_policy().name());
        }

        Command::Info { rom, core } => {
            let session = open_session(&settings, core.as_deref(), &rom)?;
            let av = session
                .av_info()
                .ok_or_else(|| anyhow!("no game loaded"))?;
            let info = serde_json::json!({
                "rom_id": session.rom_id().map(|id| id.to_string()),
                "core": session.core().path().display().to_string(),
                "region": session.region().map(|r| format!("{:?}", r)),
                "geometry": {
                    "base": [av.geometry.base_width, av.geometry.base_height],
                    "max": [av.geometry.max_width, av.geometry.max_height],
                    "aspect": av.geometry.display_aspect(),
                },
                "timing": {
                    "fps": av.timing.fps,
                    "sample_rate": av.timing.sample_rate,
                },
                "serialize_size": session.core().serialize_size(),
                "memory": MemoryRegion::ALL
                    .iter()
                    .map(|r| (r.name().to_string(), session.core().memory_size(*r).into()))
                    .collect::<serde_json::Map<String, serde_json::Value>>(),
                "cheats": session.cheats().len(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

/// Bind the core, initialize it and load `rom`.
fn open_session(
    settings: &Settings,
    core: Option<&Path>,
    rom: &Path,
) -> Result<Session<LibretroCore, NullSink>> {
    let core_path = core
        .map(Path::to_path_buf)
        .or_else(|| settings.core_path.clone())
        .ok_or_else(|| anyhow!("no core given; pass --core or set core_path in the settings"))?;

    let dirs = CoreDirectories {
        system: settings.system_dir(),
        save: settings.data_dir.join("saves"),
    };
    fs::create_dir_all(&dirs.system)?;
    fs::create_dir_all(&dirs.save)?;

    let binding = LibretroCore::load(&core_path, &dirs)?;
    let prefs = JsonPreferences::open(settings.preferences_path());
    let mut session = Session::new(
        binding,
        NullSink::new(),
        PersistenceManager::new(&settings.data_dir),
        Box::new(prefs),
    );
    session.initialize()?;

    let bytes = fs::read(rom).with_context(|| format!("reading {}", rom.display()))?;
    session.load_game(&rom.to_string_lossy(), &bytes)?;
    Ok(session)
}
