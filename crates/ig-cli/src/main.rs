mod server;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ig_core::{
    Arc, ArcValue, DGNode, Idea, NodeId, NodeStore, Unifier, breakdown, discover_relations,
};
use ig_store::{DATA_DIR_ENV, Workspace};
use rmcp::{ServiceExt, transport::stdio};

#[derive(Parser)]
#[command(name = "ig", about = "Idea graph: unify ideas and discover related ones")]
struct Cli {
    /// Data directory (defaults to $IG_DATA_DIR, then ~/.idea-graph)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Owner scope (defaults to config `owner`, then the current directory name)
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// Author a new idea and print its id
    Add {
        title: String,

        #[arg(long)]
        content: Option<String>,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Energy level, 1 to 5
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=5))]
        energy: u8,

        /// Structured arc `label=value` (repeatable). `@<id>` references a node,
        /// numbers are numbers, anything else is text.
        #[arg(long = "arc", value_parser = parse_arc)]
        arcs: Vec<Arc>,
    },

    /// Show a node, its idea and its forward chain
    Show {
        id: NodeId,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Unify two nodes and print the materialized result
    Unify {
        id1: NodeId,
        id2: NodeId,

        /// Roll back every write if the unification fails
        #[arg(long)]
        atomic: bool,
    },

    /// List ideas related to an idea, strongest first
    Discover {
        id: NodeId,

        /// How many to show (defaults to config `discovery.limit`)
        #[arg(long)]
        limit: Option<usize>,

        /// Persist the listed relations
        #[arg(long)]
        save: bool,
    },

    /// Show the similarity breakdown of two ideas
    Score { id1: NodeId, id2: NodeId },

    /// Archive an idea so discovery skips it
    Archive { id: NodeId },

    /// Show store statistics
    Stats,
}

fn parse_arc(s: &str) -> std::result::Result<Arc, String> {
    let (label, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected label=value, got '{s}'"))?;
    let label = label.trim();
    if label.is_empty() {
        return Err(format!("empty arc label in '{s}'"));
    }
    let value = ArcValue::parse_literal(value.trim())
        .map_err(|e| format!("bad node reference: {e}"))?;
    Ok(Arc::new(label, value))
}

fn open_workspace(cli: &Cli) -> Result<Workspace> {
    let base_dir = cli
        .data_dir
        .clone()
        .or_else(|| std::env::var(DATA_DIR_ENV).ok().map(PathBuf::from));
    Workspace::open(base_dir.as_deref(), cli.owner.as_deref()).context("failed to open workspace")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve => cmd_serve(&cli).await,
        Commands::Add {
            title,
            content,
            tags,
            energy,
            arcs,
        } => cmd_add(&cli, title, content.as_deref(), tags, *energy, arcs),
        Commands::Show { id, json } => cmd_show(&cli, *id, *json),
        Commands::Unify { id1, id2, atomic } => cmd_unify(&cli, *id1, *id2, *atomic),
        Commands::Discover { id, limit, save } => cmd_discover(&cli, *id, *limit, *save),
        Commands::Score { id1, id2 } => cmd_score(&cli, *id1, *id2),
        Commands::Archive { id } => cmd_archive(&cli, *id),
        Commands::Stats => cmd_stats(&cli),
    }
}

async fn cmd_serve(cli: &Cli) -> Result<()> {
    let workspace = open_workspace(cli)?;
    tracing::info!("starting MCP server for owner '{}'", workspace.owner());

    let server = server::IgServer::new(workspace);
    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    service.waiting().await?;
    Ok(())
}

fn cmd_add(
    cli: &Cli,
    title: &str,
    content: Option<&str>,
    tags: &[String],
    energy: u8,
    arcs: &[Arc],
) -> Result<()> {
    let ws = open_workspace(cli)?;
    let mut idea = Idea::new(ws.owner(), title)
        .with_tags(tags)
        .with_energy(energy);
    if let Some(content) = content {
        idea = idea.with_content(content);
    }

    let id = ws
        .store()
        .author_idea(idea, arcs.to_vec())
        .context("failed to add idea")?;
    println!("{id}");
    Ok(())
}

fn print_arcs(heading: &str, arcs: &[Arc]) {
    if arcs.is_empty() {
        return;
    }
    println!("{heading}");
    for arc in arcs {
        println!("  {} = {}", arc.label, arc.value);
    }
}

fn or_dash(id: Option<NodeId>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
}

fn cmd_show(cli: &Cli, id: NodeId, json: bool) -> Result<()> {
    let ws = open_workspace(cli)?;
    let store = ws.store();
    let node: DGNode = store.require(id).context("failed to load node")?;
    let idea = store.get_idea(id).context("failed to load idea")?;
    let chain: Vec<NodeId> = Unifier::new(store)
        .forward_chain(id)
        .context("failed to follow forward chain")?
        .iter()
        .map(|n| n.id)
        .collect();

    if json {
        let out = serde_json::json!({
            "node": node,
            "idea": idea,
            "chain": chain,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("id:         {}", node.id);
    println!("type:       {}", node.node_type.as_str());
    println!("name:       {}", node.name.as_deref().unwrap_or("-"));
    println!("owner:      {}", node.owner);
    println!("generation: {}", node.generation);
    println!("forward:    {}", or_dash(node.forward_id));
    println!("copy:       {}", or_dash(node.copy_id));
    println!("canonical:  {}", or_dash(chain.last().copied()));
    print_arcs("arcs:", &node.arc_list);
    print_arcs("comp arcs:", &node.comp_arc_list);

    if let Some(idea) = idea {
        println!("title:      {}", idea.title);
        println!("tags:       {}", idea.tags.join(", "));
        println!("energy:     {}", idea.energy);
        println!("archived:   {}", idea.archived);
        if let Some(content) = &idea.content {
            println!("content:    {content}");
        }
    }
    Ok(())
}

fn cmd_unify(cli: &Cli, id1: NodeId, id2: NodeId, atomic: bool) -> Result<()> {
    let ws = open_workspace(cli)?;
    let store = ws.store();

    let outcome = if atomic {
        store.atomically(|s| Unifier::new(s).unify(id1, id2))
    } else {
        Unifier::new(store).unify(id1, id2)
    };
    let result = outcome.context("unification failed")?;

    println!("result:    {}", result.result_node_id);
    println!("canonical: {}", result.canonical_id);
    println!("forwarded: {}", result.forwarded.len());
    if cli.verbose {
        for f in &result.forwarded {
            eprintln!(
                "--- {} -> {} (generation {}, +{} comp arcs) ---",
                f.node, f.into, f.generation, f.comp_arcs_added
            );
        }
    }
    Ok(())
}

fn cmd_discover(cli: &Cli, id: NodeId, limit: Option<usize>, save: bool) -> Result<()> {
    let ws = open_workspace(cli)?;
    let store = ws.store();
    let mut config = ws.config().discovery;
    if let Some(limit) = limit {
        config.limit = limit;
    }

    let found = config.cap(discover_relations(store, id, &config));
    if save {
        let saved = store
            .save_relations(id, &found)
            .context("failed to save relations")?;
        tracing::info!("saved {saved} relations for {id}");
    }

    if found.is_empty() {
        println!("(no related ideas)");
        return Ok(());
    }
    for candidate in &found {
        let title = store
            .get_idea(candidate.id)
            .context("failed to load idea")?
            .map(|i| i.title)
            .unwrap_or_default();
        println!("{:.3}  {}  {}", candidate.strength, candidate.id, title);
    }
    Ok(())
}

fn load_idea(ws: &Workspace, id: NodeId) -> Result<Idea> {
    ws.store()
        .get_idea(id)
        .context("failed to load idea")?
        .with_context(|| format!("{id} is not an idea"))
}

fn cmd_score(cli: &Cli, id1: NodeId, id2: NodeId) -> Result<()> {
    let ws = open_workspace(cli)?;
    let a = load_idea(&ws, id1)?;
    let b = load_idea(&ws, id2)?;
    let parts = breakdown(&a, &b);

    println!("title:   {:.3}", parts.title);
    println!("content: {:.3}", parts.content);
    println!("tags:    {:.3}", parts.tags);
    println!("energy:  {:.3}", parts.energy);
    println!("total:   {:.3}", parts.total);
    Ok(())
}

fn cmd_archive(cli: &Cli, id: NodeId) -> Result<()> {
    let ws = open_workspace(cli)?;
    ws.store()
        .archive_idea(id)
        .context("failed to archive idea")?;
    println!("archived {id}");
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let ws = open_workspace(cli)?;
    let stats = ws.store().stats().context("failed to read stats")?;

    println!("owner:        {}", ws.owner());
    println!("data_dir:     {}", ws.base_dir().display());
    println!("nodes:        {}", stats.nodes);
    println!("ideas:        {}", stats.ideas);
    println!("archived:     {}", stats.archived);
    println!("superseded:   {}", stats.superseded);
    println!("materialized: {}", stats.materialized);
    println!("relations:    {}", stats.relations);
    Ok(())
}
