use clap::{Arg, ArgAction, ArgMatches, Command};
use fluent::FluentArgs;
use fsnav::browser::{BrowseController, NavMode};
use fsnav::config::FsnavConfig;
use fsnav::directory::LocalDirectoryLister;
use fsnav::entry::Entry;
use fsnav::listing::{ListingDelta, ListingObserver, ListingViewModel};
use fsnav::localization::Localization;
use fsnav::path_fields::{OperationMode, PathField, PathFieldSynchronizer};
use fsnav::pattern::NamePattern;
use fsnav::probe::LocalFs;
use fsnav::sorting::{SortDirection, SortKey};
use std::cell::RefCell;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::time::{Duration, Instant};

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);
const WATCH_TICK: Duration = Duration::from_millis(250);

/// Collects deltas so the watch loop can report them after each batch.
struct DeltaLog(Rc<RefCell<Vec<ListingDelta>>>);

impl ListingObserver for DeltaLog {
    fn notify(&mut self, delta: &ListingDelta) {
        self.0.borrow_mut().push(*delta);
    }
}

fn cli() -> Command {
    Command::new("fsnav")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Directory listing and destination path checks")
        .subcommand_required(true)
        .arg(
            Arg::new("locale")
                .long("locale")
                .global(true)
                .help("Message locale, defaults to the configured one"),
        )
        .subcommand(
            Command::new("list")
                .about("List a directory")
                .arg(Arg::new("dir").help("Directory to list, defaults to the working directory"))
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .value_parser(SortKey::ALL.map(|key| key.as_str()))
                        .help("Sort key"),
                )
                .arg(
                    Arg::new("desc")
                        .long("desc")
                        .action(ArgAction::SetTrue)
                        .help("Sort in descending order"),
                )
                .arg(
                    Arg::new("pattern")
                        .long("pattern")
                        .help("Only show names matching this glob"),
                )
                .arg(
                    Arg::new("select")
                        .long("select")
                        .help("Select names matching this glob"),
                )
                .arg(
                    Arg::new("all")
                        .short('a')
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Show hidden entries"),
                )
                .arg(
                    Arg::new("watch")
                        .short('w')
                        .long("watch")
                        .action(ArgAction::SetTrue)
                        .help("Keep running and report changes"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Classify a destination path against the filesystem")
                .arg(
                    Arg::new("reference")
                        .long("reference")
                        .required(true)
                        .help("Original (unedited) path"),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .required(true)
                        .help("Destination path, relative paths start at the reference's parent"),
                )
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .value_parser(OperationMode::ALL.map(|mode| mode.as_str()))
                        .default_value("move"),
                )
                .arg(
                    Arg::new("overwrite")
                        .long("overwrite")
                        .action(ArgAction::SetTrue)
                        .help("Consent to replacing an existing destination"),
                ),
        )
}

/// Index, after the whole batch, of the entry that `batch[position]` put at
/// its index. `None` when a later delta removed it again.
fn settled_index(batch: &[ListingDelta], position: usize) -> Option<usize> {
    let mut index = match batch.get(position)? {
        ListingDelta::Inserted { index } | ListingDelta::Refreshed { index } => *index,
        _ => return None,
    };
    for later in &batch[position + 1..] {
        match *later {
            ListingDelta::Inserted { index: at } if at <= index => index += 1,
            ListingDelta::Removed { index: at } if at == index => return None,
            ListingDelta::Removed { index: at } if at < index => index -= 1,
            ListingDelta::Reset { .. } => return None,
            _ => {}
        }
    }
    Some(index)
}

fn format_entry(entry: &Entry) -> String {
    let name = if entry.is_dir_like() {
        format!("{}/", entry.name)
    } else {
        entry.name.clone()
    };
    let permissions = if entry.permissions.is_empty() {
        entry.kind.type_char().to_string()
    } else {
        entry.permissions.clone()
    };
    format!("{:<10} {:>10}  {}", permissions, entry.size, name)
}

fn print_listing(model: &ListingViewModel, dir: &Path, localization: &Localization) {
    let mut args = FluentArgs::new();
    args.set("path", dir.display().to_string());
    args.set("count", model.len());
    println!("{}", localization.get_with_args("listing-header", Some(&args)));
    for entry in model.entries() {
        let marker = if model.selection().contains(&entry.path) {
            '*'
        } else {
            ' '
        };
        println!("{} {}", marker, format_entry(entry));
    }
    if !model.selection().is_empty() {
        let mut args = FluentArgs::new();
        args.set("count", model.selection().len());
        println!("{}", localization.get_with_args("listing-selected", Some(&args)));
    }
}

fn run_list(
    matches: &ArgMatches,
    config: &FsnavConfig,
    localization: &Localization,
) -> Result<(), Box<dyn Error>> {
    let dir = match matches.get_one::<String>("dir") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };

    let mut sort = config.listing.sort;
    if let Some(key) = matches.get_one::<String>("sort").and_then(|k| SortKey::parse(k)) {
        sort.key = key;
    }
    if matches.get_flag("desc") {
        sort.direction = SortDirection::Descending;
    }
    let pattern = matches
        .get_one::<String>("pattern")
        .map(|p| NamePattern::new(p))
        .unwrap_or_else(|| config.listing.name_pattern());
    let show_hidden = matches.get_flag("all") || config.listing.show_hidden;

    let deltas = Rc::new(RefCell::new(Vec::new()));
    let mut model = ListingViewModel::new(pattern, show_hidden, sort);
    model.add_observer(Box::new(DeltaLog(Rc::clone(&deltas))));

    let (lister, events) = LocalDirectoryLister::channel();
    let mut browser = BrowseController::with_model(lister, events, LocalFs, model);

    if let Err(e) = browser.chdir(&dir, NavMode::Normal) {
        eprintln!("{}", localization.error_text(&e));
        process::exit(1);
    }

    if browser.is_loading() {
        let mut args = FluentArgs::new();
        args.set("path", dir.display().to_string());
        log::info!("{}", localization.get_with_args("listing-loading", Some(&args)));
        let started = Instant::now();
        while browser.is_loading() {
            browser.wait_event(WATCH_TICK);
            if started.elapsed() > LOAD_TIMEOUT {
                return Err(format!("Timed out listing {}", dir.display()).into());
            }
        }
    }

    if let Some(glob) = matches.get_one::<String>("select") {
        browser.model_mut().select_pattern(glob);
    }

    let mut current = browser.current_dir().map(Path::to_path_buf).unwrap_or(dir);
    print_listing(browser.model(), &current, localization);
    deltas.borrow_mut().clear();

    if !matches.get_flag("watch") {
        return Ok(());
    }

    let config_rx = match FsnavConfig::start_config_watcher() {
        Ok(rx) => Some(rx),
        Err(e) => {
            log::warn!("Failed to start config file watcher: {}", e);
            None
        }
    };
    println!("{}", localization.get("listing-watching"));

    loop {
        browser.wait_event(WATCH_TICK);

        if let Some(ref config_rx) = config_rx
            && let Ok(config_result) = config_rx.try_recv()
        {
            match config_result {
                Ok(new_config) => {
                    browser.set_sort(new_config.listing.sort);
                    browser.set_filter(
                        new_config.listing.name_pattern(),
                        new_config.listing.show_hidden,
                    );
                    println!("{}", localization.get("config-reloaded"));
                }
                Err(error_msg) => log::warn!("Config watcher error: {}", error_msg),
            }
        }

        if let Some(now) = browser.current_dir()
            && now != current
        {
            let mut args = FluentArgs::new();
            args.set("path", now.display().to_string());
            println!(
                "{}",
                localization.get_with_args("listing-directory-removed", Some(&args))
            );
            current = now.to_path_buf();
        }

        let batch: Vec<ListingDelta> = deltas.borrow_mut().drain(..).collect();
        if batch.is_empty() {
            continue;
        }
        for (position, delta) in batch.iter().enumerate() {
            let marker = match delta {
                ListingDelta::Inserted { .. } => '+',
                ListingDelta::Refreshed { .. } => '~',
                ListingDelta::Removed { index } => {
                    println!("- #{}", index);
                    continue;
                }
                ListingDelta::Reset { .. } => continue,
            };
            let settled = settled_index(&batch, position);
            if let Some(entry) = settled.and_then(|index| browser.model().get(index)) {
                println!("{} {}", marker, entry.name);
            }
        }
        print_listing(browser.model(), &current, localization);
    }
}

fn run_check(matches: &ArgMatches, localization: &Localization) -> Result<(), Box<dyn Error>> {
    let reference = matches
        .get_one::<String>("reference")
        .ok_or("missing --reference")?;
    let target = matches.get_one::<String>("target").ok_or("missing --target")?;
    let mode = matches
        .get_one::<String>("mode")
        .and_then(|m| OperationMode::parse(m))
        .unwrap_or(OperationMode::Move);

    let reference = std::path::absolute(reference)?;
    let mut synchronizer = PathFieldSynchronizer::new(LocalFs, &reference, mode);
    synchronizer.set_overwrite(matches.get_flag("overwrite"));
    let verdict = synchronizer.edit(PathField::FullPath, target).clone();

    println!("name:      {}", synchronizer.name());
    println!("extension: {}", synchronizer.extension());
    println!("parent:    {}", synchronizer.parent());
    if let Some(resolved) = synchronizer.target() {
        println!("target:    {}", resolved.display());
    }
    println!("{}", localization.hint_text(&verdict));
    println!("{}", localization.confirm_text(verdict.confirm_enabled));

    if !verdict.confirm_enabled {
        process::exit(2);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let matches = cli().get_matches();

    let config = FsnavConfig::load().unwrap_or_else(|e| {
        log::warn!("Using default config: {}", e);
        FsnavConfig::default()
    });
    let locale = matches
        .get_one::<String>("locale")
        .cloned()
        .unwrap_or_else(|| config.get_locale());
    let localization = Localization::new(&locale)?;

    match matches.subcommand() {
        Some(("list", sub)) => run_list(sub, &config, &localization),
        Some(("check", sub)) => run_check(sub, &localization),
        _ => Ok(()),
    }
}
