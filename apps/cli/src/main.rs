use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use scratchpad_core::ScratchScope;
use scratchpad_project::{ListMode, ScratchNode, ScratchTree, WorkspaceStore};
use scratchpad_settings::{PreferencesStore, ScratchPreferences};
use scratchpad_sync::{
    DirectorySyncEngine, EditorHost, ScratchService, ScratchSignal, StoreBackedHost, SyncOptions,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "scratchpad",
    about = "Manage scratch files in the Global and workspace scratch roots",
    author,
    version
)]
struct Cli {
    /// 覆寫全域暫存根目錄。 / Override the Global scratch root.
    #[arg(long, global = true, value_name = "PATH", env = "SCRATCHPAD_GLOBAL_ROOT")]
    global_root: Option<PathBuf>,
    /// 開啟的工作區資料夾，用於方案範圍。 / Open workspace folder; enables the Solution scope.
    #[arg(long, global = true, value_name = "PATH", env = "SCRATCHPAD_WORKSPACE")]
    workspace: Option<PathBuf>,
    /// 偏好設定 JSON 檔。 / Preferences JSON file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 建立下一個編號暫存檔。 / Create the next numbered scratch file.
    New(NewArgs),
    /// 列出暫存項目。 / List scratch entries.
    List(ListArgs),
    /// 印出兩個根目錄的樹狀結構。 / Print the tree of both roots.
    Tree(TreeArgs),
    /// 同資料夾內更名檔案。 / Rename a file within its folder.
    Rename(RenameArgs),
    /// 更換副檔名。 / Change a file's extension.
    Ext(ExtArgs),
    /// 搬移檔案到資料夾。 / Move a file into a folder.
    Mv(MoveArgs),
    /// 搬移檔案到另一個範圍的根目錄。 / Move a file to the root of another scope.
    MvScope(MoveScopeArgs),
    /// 刪除檔案。 / Delete a file.
    Rm(PathArg),
    /// 建立子資料夾。 / Create a sub-folder.
    Mkdir(RenameArgs),
    /// 更名資料夾。 / Rename a folder.
    RenameDir(RenameArgs),
    /// 搬移資料夾。 / Move a folder under another folder.
    MvDir(MoveArgs),
    /// 遞迴刪除資料夾。 / Delete a folder recursively.
    Rmdir(PathArg),
    /// 工作階段紀錄。 / Inspect or reset the session record.
    #[command(subcommand)]
    Session(SessionCommand),
    /// 監看根目錄並在變更時印出樹狀結構。 / Watch the roots and print the tree on every change.
    Watch(WatchArgs),
    /// 偏好設定。 / Show or edit preferences.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct NewArgs {
    /// 目標範圍。 / Target scope.
    #[arg(long, default_value = "global")]
    scope: ScratchScope,
    /// 初始內容。 / Initial content.
    #[arg(long)]
    content: Option<String>,
    /// 建立在此範圍內的子資料夾。 / Create inside this in-scope folder instead of the root.
    #[arg(long, value_name = "PATH", conflicts_with = "scope")]
    folder: Option<PathBuf>,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, default_value = "global")]
    scope: ScratchScope,
    #[arg(long)]
    recursive: bool,
}

#[derive(Args)]
struct TreeArgs {
    /// 以 JSON 輸出。 / Emit JSON instead of an indented listing.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RenameArgs {
    path: PathBuf,
    name: String,
}

#[derive(Args)]
struct ExtArgs {
    path: PathBuf,
    /// 新副檔名；空字串表示移除。 / New extension; an empty string strips it.
    extension: String,
}

#[derive(Args)]
struct MoveArgs {
    path: PathBuf,
    destination: PathBuf,
}

#[derive(Args)]
struct MoveScopeArgs {
    path: PathBuf,
    scope: ScratchScope,
}

#[derive(Args)]
struct PathArg {
    path: PathBuf,
}

#[derive(Subcommand)]
enum SessionCommand {
    /// 列出紀錄中的檔案。 / Print the recorded open files.
    Show,
    /// 清空紀錄。 / Empty the record.
    Clear,
    /// 還原並列出仍存在的檔案。 / Restore the record, dropping files that no longer exist.
    Restore,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// 印出生效中的偏好設定。 / Print the effective preferences as JSON.
    Show,
    /// 寫入一項設定到 --config 檔。 / Persist one preference into the --config file.
    Set(ConfigSetArgs),
}

#[derive(Args)]
struct ConfigSetArgs {
    /// Dotted key, e.g. `naming.file_prefix` or `timing.autosave_debounce_ms`.
    key: String,
    value: String,
}

#[derive(Args)]
struct WatchArgs {
    /// 監看秒數；未指定則持續到中斷。 / Stop after this many seconds; runs until interrupted otherwise.
    #[arg(long)]
    seconds: Option<u64>,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let Cli {
        global_root,
        workspace,
        config,
        command,
    } = Cli::parse();
    let preferences = load_preferences(config.as_deref(), global_root.as_deref())?;
    let workspace = workspace.map(|dir| resolve_input_path(&dir)).transpose()?;

    let store = WorkspaceStore::from_preferences(&preferences);
    store.set_workspace(workspace.as_deref());

    match command {
        Commands::New(args) => execute_new(&store, args),
        Commands::List(args) => execute_list(&store, args),
        Commands::Tree(args) => execute_tree(&store, args),
        Commands::Rename(args) => {
            let path = resolve_input_path(&args.path)?;
            report_path(store.rename_file(&path, &args.name)?, "rename", &path)
        }
        Commands::Ext(args) => {
            let path = resolve_input_path(&args.path)?;
            report_path(store.change_extension(&path, &args.extension)?, "change extension of", &path)
        }
        Commands::Mv(args) => {
            let path = resolve_input_path(&args.path)?;
            let destination = resolve_input_path(&args.destination)?;
            report_path(store.move_file(&path, &destination)?, "move", &path)
        }
        Commands::MvScope(args) => {
            let path = resolve_input_path(&args.path)?;
            report_path(store.move_to_scope(&path, args.scope)?, "move", &path)
        }
        Commands::Rm(args) => {
            let path = resolve_input_path(&args.path)?;
            report_removed(store.delete_file(&path)?, &path)
        }
        Commands::Mkdir(args) => {
            let parent = resolve_input_path(&args.path)?;
            report_path(store.create_sub_folder(&parent, &args.name)?, "create a folder in", &parent)
        }
        Commands::RenameDir(args) => {
            let path = resolve_input_path(&args.path)?;
            report_path(store.rename_folder(&path, &args.name)?, "rename", &path)
        }
        Commands::MvDir(args) => {
            let path = resolve_input_path(&args.path)?;
            let destination = resolve_input_path(&args.destination)?;
            report_path(store.move_folder(&path, &destination)?, "move", &path)
        }
        Commands::Rmdir(args) => {
            let path = resolve_input_path(&args.path)?;
            report_removed(store.delete_folder(&path)?, &path)
        }
        Commands::Session(command) => execute_session(store, &preferences, command),
        Commands::Watch(args) => execute_watch(store, &preferences, args),
        Commands::Config(ConfigCommand::Show) => {
            println!("{}", serde_json::to_string_pretty(&preferences)?);
            Ok(())
        }
        Commands::Config(ConfigCommand::Set(args)) => execute_config_set(config.as_deref(), args),
    }
}

fn execute_config_set(config: Option<&Path>, args: ConfigSetArgs) -> Result<()> {
    let Some(config) = config else {
        bail!("config set needs --config <FILE>");
    };
    let path = resolve_input_path(config)?;
    let mut store = PreferencesStore::load(&path)
        .with_context(|| format!("failed to load preferences from {}", path.display()))?;

    let mut edited = store.preferences().clone();
    apply_preference(&mut edited, &args.key, &args.value)?;
    store
        .overwrite(edited)
        .with_context(|| format!("failed to save preferences to {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(store.preferences())?);
    Ok(())
}

fn apply_preference(preferences: &mut ScratchPreferences, key: &str, value: &str) -> Result<()> {
    let millis = || -> Result<u64> {
        value
            .parse()
            .with_context(|| format!("'{value}' is not a number of milliseconds"))
    };
    match key {
        "storage.global_root" => {
            preferences.storage.global_root = if value.is_empty() {
                None
            } else {
                Some(resolve_input_path(Path::new(value))?)
            };
        }
        "storage.solution_subdir" => preferences.storage.solution_subdir = PathBuf::from(value),
        "naming.file_prefix" => preferences.naming.file_prefix = value.to_string(),
        "naming.default_extension" => preferences.naming.default_extension = value.to_string(),
        "timing.rebuild_debounce_ms" => preferences.timing.rebuild_debounce_ms = millis()?,
        "timing.autosave_debounce_ms" => preferences.timing.autosave_debounce_ms = millis()?,
        "timing.settle_delay_ms" => preferences.timing.settle_delay_ms = millis()?,
        other => bail!("unknown preference '{other}'"),
    }
    Ok(())
}

fn load_preferences(config: Option<&Path>, global_root: Option<&Path>) -> Result<ScratchPreferences> {
    let mut preferences = match config {
        Some(path) => {
            let path = resolve_input_path(path)?;
            PreferencesStore::load(&path)
                .with_context(|| format!("failed to load preferences from {}", path.display()))?
                .into_preferences()
        }
        None => ScratchPreferences::default(),
    };
    if let Some(root) = global_root {
        preferences.storage.global_root = Some(resolve_input_path(root)?);
    }
    Ok(preferences)
}

fn execute_new(store: &WorkspaceStore, args: NewArgs) -> Result<()> {
    let created = match &args.folder {
        Some(folder) => {
            let folder = resolve_input_path(folder)?;
            store.create_file_in(&folder, args.content.as_deref())?
        }
        None => store.create_file(args.scope, args.content.as_deref())?,
    };
    match created {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None if args.folder.is_some() => bail!("folder is not an existing scratch folder"),
        None => bail!("scope '{}' has no root; pass --workspace", args.scope),
    }
}

fn execute_list(store: &WorkspaceStore, args: ListArgs) -> Result<()> {
    let Some(root) = store.root_for(args.scope) else {
        bail!("scope '{}' has no root; pass --workspace", args.scope);
    };
    let mode = if args.recursive {
        ListMode::Recursive
    } else {
        ListMode::OneLevel
    };
    for entry in store.list_entries(&root, mode)? {
        let marker = if entry.is_folder() { "/" } else { "" };
        println!("{}{}{}", "  ".repeat(entry.depth), entry.name, marker);
    }
    Ok(())
}

fn execute_tree(store: &WorkspaceStore, args: TreeArgs) -> Result<()> {
    let tree = ScratchTree::build(store, 1)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print_tree(&tree);
    }
    Ok(())
}

fn print_tree(tree: &ScratchTree) {
    for root in tree.roots() {
        root.walk(0, &mut |node: &ScratchNode, depth| {
            if depth == 0 {
                println!("[{}] {}", node.name, node.path.display());
            } else {
                let marker = if node.is_folder() { "/" } else { "" };
                println!("{}{}{}", "  ".repeat(depth), node.name, marker);
            }
        });
    }
}

fn execute_session(
    store: WorkspaceStore,
    preferences: &ScratchPreferences,
    command: SessionCommand,
) -> Result<()> {
    match command {
        SessionCommand::Show => {
            for path in store.read_session_record().open_files {
                println!("{}", path.display());
            }
            Ok(())
        }
        SessionCommand::Clear => {
            store.clear_session()?;
            println!("Cleared session record at {}", store.session().path().display());
            Ok(())
        }
        SessionCommand::Restore => {
            let runtime = build_runtime()?;
            runtime.block_on(async move {
                let store = Arc::new(store);
                let host = Arc::new(StoreBackedHost::new(Arc::clone(&store)));
                let options = SyncOptions {
                    watch_roots: false,
                    ..SyncOptions::from(preferences)
                };
                let (service, _signals) =
                    ScratchService::start_with(store, options, host as Arc<dyn EditorHost>).await?;
                for path in service.tracker().tracked_paths() {
                    println!("{}", path.display());
                }
                service.shutdown();
                Ok::<(), anyhow::Error>(())
            })
        }
    }
}

fn execute_watch(store: WorkspaceStore, preferences: &ScratchPreferences, args: WatchArgs) -> Result<()> {
    let runtime = build_runtime()?;
    runtime.block_on(async move {
        let (sender, mut signals) = scratchpad_sync::signals::channel();
        let engine =
            DirectorySyncEngine::start(Arc::new(store), SyncOptions::from(preferences), sender)
                .await
                .context("failed to start watching the scratch roots")?;

        let deadline = args.seconds.map(Duration::from_secs);
        let watch = async {
            while let Some(signal) = signals.recv().await {
                if let ScratchSignal::TreeChanged(tree) = signal {
                    println!("-- revision {} --", tree.revision);
                    print_tree(&tree);
                }
            }
        };
        match deadline {
            Some(limit) => {
                let _ = tokio::time::timeout(limit, watch).await;
            }
            None => watch.await,
        }
        engine.shutdown();
        Ok::<(), anyhow::Error>(())
    })
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")
}

fn report_path(result: Option<PathBuf>, action: &str, path: &Path) -> Result<()> {
    match result {
        Some(target) => {
            println!("{}", target.display());
            Ok(())
        }
        None => bail!(
            "cannot {action} '{}': outside the scratch roots, a root itself, or the target already exists",
            path.display()
        ),
    }
}

fn report_removed(removed: bool, path: &Path) -> Result<()> {
    if !removed {
        bail!(
            "cannot delete '{}': not a scratch entry below a root",
            path.display()
        );
    }
    println!("Deleted {}", path.display());
    Ok(())
}

fn resolve_input_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    Ok(cwd.join(path))
}
