use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use clap::{Parser, ValueEnum};
use rand::rngs::SmallRng;
use tracing::info;
use tracing_subscriber::EnvFilter;
use FlipChain::chain::MarkovChain;
use FlipChain::gen_weights::gen_uniform_weights;
use FlipChain::imbalance::imbalance;
use FlipChain::io::{
    read_attributes, read_matrix_market_as_graph, write_assignment_to_file, write_flip_log,
};
use FlipChain::proposals::{ProposalKind, SelfLoopCorrection};
use FlipChain::scores::{efficiency_gap, mean_median, mean_thirdian};
use FlipChain::validity::{
    always_accept, no_vanishing_districts, single_flip_contiguous,
    within_percent_of_ideal_population, Constraint, Validator,
};
use FlipChain::{Assignment, Error, Flip, Partition, UpdaterRegistry};

// Name the population tally is registered under, whatever its column is called.
const POPULATION: &str = "population";

// Name the election updater is registered under.
const VOTES: &str = "votes";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProposalArg {
    Single,
    Several,
    EveryDistrict,
    Chunk,
    EveryEdge,
    SingleOrChunk,
}

impl From<ProposalArg> for ProposalKind {
    fn from(arg: ProposalArg) -> Self {
        match arg {
            ProposalArg::Single => ProposalKind::Single,
            ProposalArg::Several => ProposalKind::Several,
            ProposalArg::EveryDistrict => ProposalKind::EveryDistrict,
            ProposalArg::Chunk => ProposalKind::Chunk,
            ProposalArg::EveryEdge => ProposalKind::EveryEdgeOfDistrict,
            ProposalArg::SingleOrChunk => ProposalKind::SingleOrChunk,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path of the .mtx file
    mtx_filepath: PathBuf,

    /// Number of chain steps, the initial partition included
    steps: usize,

    /// Filename where the accepted flips are written
    flip_log: PathBuf,

    /// Whitespace separated node attribute table, one row per node
    #[arg(short, long)]
    attributes: Option<PathBuf>,

    /// Integer attribute column holding each node's initial district
    #[arg(short, long)]
    district_column: Option<String>,

    /// Attribute column summed per district; uniform weights when absent
    #[arg(long, default_value = POPULATION)]
    population_column: String,

    /// Number of districts of the round-robin plan used without a district column
    #[arg(short, long, default_value_t = 2)]
    parts: usize,

    /// Proposal generator
    #[arg(long, value_enum, default_value_t = ProposalArg::Single)]
    proposal: ProposalArg,

    /// Seed of the chain's random source
    #[arg(short, long)]
    seed: Option<u64>,

    /// Largest allowed relative deviation of a district's population from the ideal
    #[arg(long, default_value_t = 0.01)]
    percent: f64,

    /// Keep proposals with probability cut edges / bound, self looping otherwise
    #[arg(long)]
    self_loop_bound: Option<usize>,

    /// Reject flips that disconnect the district they leave
    #[arg(long)]
    contiguous: bool,

    /// Vote columns, one per party, scored on the final plan
    #[arg(long, value_delimiter = ',')]
    parties: Vec<String>,

    /// Filename where the final assignment is written
    #[arg(long)]
    final_assignment: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut graph = read_matrix_market_as_graph(&args.mtx_filepath)?;
    if let Some(attributes) = &args.attributes {
        read_attributes(attributes, &mut graph)?;
    }
    if !graph.has_attribute(&args.population_column) {
        info!(column = %args.population_column, "population column absent, using uniform weights");
        graph.add_attribute(&args.population_column, gen_uniform_weights(graph.len()))?;
    }

    let assignment = match &args.district_column {
        Some(column) => Assignment::from_attribute(&graph, column)?,
        None => Assignment::round_robin(graph.len(), args.parts),
    };

    let mut updaters = UpdaterRegistry::new()
        .with_cut_edges()?
        .with_cut_edges_by_part()?
        .with_tally(&args.population_column, Some(POPULATION))?;
    if !args.parties.is_empty() {
        let parties: Vec<&str> = args.parties.iter().map(String::as_str).collect();
        updaters = updaters.with_election(VOTES, &parties)?;
    }
    let initial = Partition::new(Arc::new(graph), assignment, Arc::new(updaters))?;

    let mut validator = Validator::new(vec![
        no_vanishing_districts(POPULATION),
        within_percent_of_ideal_population(&initial, POPULATION, args.percent)?,
    ]);
    if args.contiguous {
        let contiguous: Constraint = Box::new(single_flip_contiguous);
        validator.push(contiguous);
    }

    let kind = ProposalKind::from(args.proposal);
    let correction = args.self_loop_bound.map(SelfLoopCorrection::new).transpose()?;
    let proposal = move |partition: &Partition, rng: &mut SmallRng| -> Result<Flip, Error> {
        let flip = kind.propose(partition, rng)?;
        match &correction {
            Some(correction) => correction.apply(partition, flip, rng),
            None => Ok(flip),
        }
    };

    let mut chain = MarkovChain::new(proposal, validator, always_accept, initial, args.steps)?;
    if let Some(seed) = args.seed {
        chain = chain.with_seed(seed);
    }

    let start = Instant::now();
    for state in chain.by_ref() {
        match state {
            Ok(_) => {}
            // The chain has nowhere to go; report what it reached.
            Err(Error::NoProposalAvailable) => break,
            Err(error) => return Err(error.into()),
        }
    }
    let elapsed_time = start.elapsed();

    let last = chain.state();
    last.verify()?;
    let edge_cut = last.graph().edge_cut(&last.assignment().to_vec());
    let imbalance_of_partition = imbalance(last.tally(POPULATION)?);

    write_flip_log(chain.flip_log(), &args.flip_log)?;
    if let Some(path) = &args.final_assignment {
        write_assignment_to_file(last.assignment(), path)?;
    }

    println!("Edge cut {:?}", edge_cut);
    println!("Imbalance {:?}", imbalance_of_partition);
    println!("Accepted moves {:?}", chain.accepted_moves());
    println!("Execution time {:?}", elapsed_time);

    if !args.parties.is_empty() {
        let results = last.election(VOTES)?;
        for party in results.parties() {
            println!("Seats {} {:?}", party, results.seats(party)?);
        }
        if results.parties().len() == 2 {
            println!("Efficiency gap {:?}", efficiency_gap(results)?);
        }
        println!("Mean median {:?}", mean_median(results)?);
        println!("Mean thirdian {:?}", mean_thirdian(results)?);
    }
    Ok(())
}
