use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::{anyhow, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use verloc_core::ledger::{Ledger, Transaction};
use verloc_core::network::{EpochBeacon, Network, Node};
use verloc_core::{Error, NodeId};

const DEFAULT_NETWORK_SIZE: usize = 20;
const DEFAULT_EPOCHS: u64 = 3;
const DEFAULT_REFERENCES: usize = 5;
const DEFAULT_OUTPUT: &str = "blockchain.json";
const MAX_BLOCK_PROOF: u64 = 1000;

#[derive(Parser, Debug)]
#[command(about = "Run VerLoc epochs and dump the resulting ledger")]
struct Args {
    /// Number of nodes in the network.
    #[arg(short = 'n', long = "nodes", default_value_t = DEFAULT_NETWORK_SIZE)]
    network_size: usize,

    /// Number of epochs to run.
    #[arg(short, long, default_value_t = DEFAULT_EPOCHS)]
    epochs: u64,

    /// Partners drawn per node and epoch.
    #[arg(short, long, default_value_t = DEFAULT_REFERENCES)]
    references: usize,

    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Seed for keys, beacons and block proofs; random when absent.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    workers: Option<usize>,
}

type NodeWork = (NodeId, Vec<Transaction>);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("verloc=info".parse()?),
        )
        .init();

    let args = Args::parse();
    if args.network_size < 2 {
        return Err(anyhow!("a network needs at least 2 nodes"));
    }
    if args.references == 0 || args.references >= args.network_size {
        return Err(anyhow!(
            "references must be in 1..{} for a network of {}",
            args.network_size,
            args.network_size
        ));
    }
    let workers = args
        .workers
        .unwrap_or_else(|| thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
        .clamp(1, args.network_size);

    println!("VerLoc chain");
    println!("  nodes:      {}", args.network_size);
    println!("  epochs:     {}", args.epochs);
    println!("  references: {}", args.references);
    println!("  output:     {}", args.output.display());

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut network = Network::new(args.network_size, &mut rng);
    let mut ledger = Ledger::new();
    ledger.submit(network.initialization_transaction());
    ledger.new_block(rng.gen_range(0..=MAX_BLOCK_PROOF), None)?;
    info!(nodes = network.len(), "network initialized");

    for epoch in 1..=args.epochs {
        let beacon = Network::generate_epoch_beacon(&mut rng);
        let block_id = ledger.len() as u64;
        let nodes = network.take_nodes();
        let (nodes, work) = run_epoch(nodes, beacon, epoch, block_id, args.references, workers)?;
        network.restore(nodes);

        let mut submitted = 0usize;
        for (node, txs) in work {
            for tx in txs {
                if let Err(err) = network.audit_random_outputs(&tx, &beacon) {
                    warn!(node, epoch, error = %err, "dropping unverifiable random output");
                    continue;
                }
                ledger.submit(tx);
                submitted += 1;
            }
        }
        let block = ledger.new_block(rng.gen_range(0..=MAX_BLOCK_PROOF), None)?;
        info!(epoch, block = block.index, transactions = submitted, "epoch sealed");
    }

    ledger.verify_integrity()?;
    ledger
        .write_json(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("Ledger of {} blocks written to {}", ledger.len(), args.output.display());
    Ok(())
}

/// Workers hand their nodes back when done.
fn run_epoch(
    nodes: Vec<Node>,
    beacon: EpochBeacon,
    epoch: u64,
    block_id: u64,
    references: usize,
    workers: usize,
) -> anyhow::Result<(Vec<Node>, BTreeMap<NodeId, Vec<Transaction>>)> {
    let network_size = nodes.len();
    let (tx, rx) = mpsc::channel::<NodeWork>();

    let mut shards: Vec<Vec<Node>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, node) in nodes.into_iter().enumerate() {
        shards[i % workers].push(node);
    }

    let handles: Vec<_> = shards
        .into_iter()
        .map(|shard| {
            let tx = tx.clone();
            thread::spawn(move || {
                node_worker(shard, beacon, epoch, block_id, references, network_size, tx)
            })
        })
        .collect();
    drop(tx);

    // Ordered by node id so the block contents do not depend on scheduling.
    let mut work = BTreeMap::new();
    for (node, txs) in rx {
        work.insert(node, txs);
    }

    let mut nodes = Vec::with_capacity(network_size);
    for handle in handles {
        let shard = handle
            .join()
            .map_err(|_| anyhow!("epoch {epoch} worker panicked"))?;
        nodes.extend(shard);
    }
    Ok((nodes, work))
}

fn node_worker(
    mut shard: Vec<Node>,
    beacon: EpochBeacon,
    epoch: u64,
    block_id: u64,
    references: usize,
    network_size: usize,
    tx: mpsc::Sender<NodeWork>,
) -> Vec<Node> {
    for node in shard.iter_mut() {
        let mut txs = Vec::with_capacity(2);
        match node.compute_random_output(&beacon, epoch, block_id) {
            Ok(t) => txs.push(t),
            Err(err) => {
                warn!(node = node.id, epoch, error = %err, "no random output");
                if !publish(&tx, node.id, txs) {
                    break;
                }
                continue;
            }
        }
        match node.generate_schedule(references, epoch, network_size) {
            Ok(t) => txs.push(t),
            Err(Error::ScheduleExhausted { partial, target, .. }) => {
                let got = partial.len();
                warn!(node = node.id, epoch, got, target, "partial schedule published");
                txs.push(node.schedule_transaction(epoch));
            }
            Err(err) => warn!(node = node.id, epoch, error = %err, "no schedule"),
        }
        if !publish(&tx, node.id, txs) {
            break;
        }
    }
    shard
}

fn publish(tx: &mpsc::Sender<NodeWork>, node: NodeId, txs: Vec<Transaction>) -> bool {
    if tx.send((node, txs)).is_err() {
        warn!(node, "collector gone, worker stopping");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_NETWORK_SIZE: usize = 6;
    const TEST_REFERENCES: usize = 2;

    fn nodes() -> (Vec<Node>, EpochBeacon) {
        let mut rng = StdRng::seed_from_u64(11);
        let mut network = Network::new(TEST_NETWORK_SIZE, &mut rng);
        (network.take_nodes(), Network::generate_epoch_beacon(&mut rng))
    }

    #[test]
    fn publish_reports_a_closed_collector() {
        let (tx, rx) = mpsc::channel::<NodeWork>();
        assert!(publish(&tx, 1, Vec::new()));
        assert_eq!(rx.recv().unwrap(), (1, Vec::new()));
        drop(rx);
        assert!(!publish(&tx, 2, Vec::new()));
    }

    #[test]
    fn worker_hands_back_its_shard_when_collector_is_gone() {
        let (shard, beacon) = nodes();
        let (tx, rx) = mpsc::channel::<NodeWork>();
        drop(rx);
        let back = node_worker(shard, beacon, 1, 1, TEST_REFERENCES, TEST_NETWORK_SIZE, tx);
        assert_eq!(back.len(), TEST_NETWORK_SIZE);
    }

    #[test]
    fn epoch_collects_work_for_every_node() {
        let (shard, beacon) = nodes();
        let (back, work) = run_epoch(shard, beacon, 1, 1, TEST_REFERENCES, 3).unwrap();
        assert_eq!(back.len(), TEST_NETWORK_SIZE);
        assert_eq!(work.len(), TEST_NETWORK_SIZE);
        assert!(work.values().all(|txs| txs.len() == 2));
    }
}
