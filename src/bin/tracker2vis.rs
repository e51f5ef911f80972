//! Convert dynamic community tracker output into the timeline and events
//! resources read by the viewer.
//!
//! Input timeline lines look like `D12:1=3,2=3,4=1` (dynamic community name,
//! then `step=community` pairs). Step community files (`*.comm`, one community
//! per line as whitespace-separated user ids) are read in name order; the
//! n-th file is step n.
//!
//! Detected events follow Greene, Doyle & Cunningham, "Tracking the evolution
//! of communities in dynamic social networks" (ASONAM 2010): split, merge,
//! birth, death, intermittence, expansion and contraction.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

/// Generate timeline and events in JSON representation for visualisation.
#[derive(Debug, Parser)]
#[command(name = "tracker2vis", after_help = "You can omit filenames to use standard input/output.")]
struct Args {
    /// Input timeline (dynamic tracker text format).
    #[arg(long, value_name = "FILENAME")]
    timeline: Option<PathBuf>,

    /// Directory with community step files (`*.comm`).
    #[arg(long, value_name = "DIRECTORY", default_value = "./")]
    steps_dir: PathBuf,

    /// Relative growth above which an expansion is reported.
    #[arg(long, value_name = "FLOAT", default_value_t = 0.10)]
    expansion_threshold: f64,

    /// Relative reduction above which a contraction is reported.
    #[arg(long, value_name = "FLOAT", default_value_t = 0.10)]
    contraction_threshold: f64,

    /// Output timeline JSON.
    #[arg(long, value_name = "FILENAME")]
    output: Option<PathBuf>,

    /// Output events JSON.
    #[arg(long, value_name = "FILENAME")]
    events: PathBuf,
}

// ---------------------------------------------------------------------------
// Timeline model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
struct TimelineStep {
    step: u32,
    community: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct DynamicCommunity {
    name: String,
    #[serde(rename = "data")]
    steps: Vec<TimelineStep>,
}

impl DynamicCommunity {
    fn parse(line: &str) -> Result<Self> {
        let (name, raw_steps) = line
            .split_once(':')
            .with_context(|| format!("expected NAME:STEPS, got '{line}'"))?;
        let steps = raw_steps
            .split(',')
            .map(|pair| {
                let (step, community) = pair
                    .split_once('=')
                    .with_context(|| format!("expected STEP=COMMUNITY, got '{pair}'"))?;
                Ok(TimelineStep {
                    step: step.trim().parse::<u32>().with_context(|| format!("bad step in '{pair}'"))?,
                    community: community
                        .trim()
                        .parse::<u32>()
                        .with_context(|| format!("bad community in '{pair}'"))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: name.to_string(),
            steps,
        })
    }

    /// Drop every step before `step`.
    fn remove_until(&mut self, step: u32) {
        self.steps.retain(|s| s.step >= step);
    }

    /// Drop every step after `step`.
    fn remove_after(&mut self, step: u32) {
        self.steps.retain(|s| s.step <= step);
    }
}

fn read_timeline(reader: impl BufRead) -> Result<Vec<DynamicCommunity>> {
    let mut timeline = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.context("reading timeline")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        timeline.push(DynamicCommunity::parse(line).with_context(|| format!("timeline line {}", i + 1))?);
    }
    Ok(timeline)
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Endpoint {
    name: String,
    step: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct EdgeEvent {
    source: Endpoint,
    target: Endpoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    growth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reduction: Option<f64>,
}

impl EdgeEvent {
    fn new(source: (&str, u32), target: (&str, u32)) -> Self {
        Self {
            source: Endpoint {
                name: source.0.to_string(),
                step: source.1,
            },
            target: Endpoint {
                name: target.0.to_string(),
                step: target.1,
            },
            growth: None,
            reduction: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct PointEvent {
    name: String,
    step: u32,
}

/// Field order is the key order of the written JSON object.
#[derive(Debug, Serialize)]
struct TimelineEvents {
    splits: Vec<EdgeEvent>,
    births: Vec<PointEvent>,
    merges: Vec<EdgeEvent>,
    deaths: Vec<PointEvent>,
    intermittents: Vec<PointEvent>,
    expansions: Vec<EdgeEvent>,
    contractions: Vec<EdgeEvent>,
}

/// Remove later communities whose steps duplicate an earlier one.
/// Returns `(kept, removed)` name pairs.
fn deduplicate(timeline: &mut Vec<DynamicCommunity>) -> Vec<(String, String)> {
    let mut dups = Vec::new();
    for (i, d_i) in timeline.iter().enumerate() {
        for d_j in &timeline[i + 1..] {
            if d_i.steps == d_j.steps {
                dups.push((d_i.name.clone(), d_j.name.clone()));
            }
        }
    }
    let removed: BTreeSet<&str> = dups.iter().map(|(_, j)| j.as_str()).collect();
    timeline.retain(|d| !removed.contains(d.name.as_str()));
    dups
}

fn correct_targets(events: &mut [EdgeEvent], dups: &[(String, String)]) {
    for (kept, removed) in dups {
        for event in events.iter_mut() {
            if &event.target.name == removed {
                event.target.name = kept.clone();
            }
        }
    }
}

/// A split happens when D_j shares D_i's timeline up to t-1 and diverges at t.
/// D_j is trimmed to start at the divergence.
fn find_splits(timeline: &mut Vec<DynamicCommunity>) -> Vec<EdgeEvent> {
    let mut splits = Vec::new();
    for i in 0..timeline.len() {
        for j in i + 1..timeline.len() {
            let (d_i, d_j) = (&timeline[i], &timeline[j]);
            if d_i.steps.first().is_none() || d_i.steps.first() != d_j.steps.first() {
                continue;
            }
            let mut prev: Option<TimelineStep> = None;
            let mut divergence = None;
            for (s_i, s_j) in d_i.steps.iter().zip(&d_j.steps) {
                if s_i != s_j {
                    divergence = prev.map(|p| (p.step, s_j.step));
                    break;
                }
                prev = Some(*s_i);
            }
            if let Some((source_step, target_step)) = divergence {
                splits.push(EdgeEvent::new(
                    (d_i.name.as_str(), source_step),
                    (d_j.name.as_str(), target_step),
                ));
                timeline[j].remove_until(target_step);
            }
        }
    }
    let dups = deduplicate(timeline);
    correct_targets(&mut splits, &dups);
    splits
}

/// A merge happens when D_i and D_j at t-1 match a single community at t.
/// D_j is trimmed to end before the merge.
fn find_merges(timeline: &mut Vec<DynamicCommunity>) -> Vec<EdgeEvent> {
    let mut merges = Vec::new();
    for i in 0..timeline.len() {
        for j in i + 1..timeline.len() {
            let (d_i, d_j) = (&timeline[i], &timeline[j]);
            if d_i.steps.last().is_none() || d_i.steps.last() != d_j.steps.last() {
                continue;
            }
            let mut prev: Option<TimelineStep> = None;
            let mut divergence = None;
            for (s_i, s_j) in d_i.steps.iter().rev().zip(d_j.steps.iter().rev()) {
                if s_i != s_j {
                    divergence = prev.map(|p| (s_j.step, p.step));
                    break;
                }
                prev = Some(*s_i);
            }
            if let Some((source_step, target_step)) = divergence {
                merges.push(EdgeEvent::new(
                    (d_j.name.as_str(), source_step),
                    (d_i.name.as_str(), target_step),
                ));
                timeline[j].remove_after(source_step);
            }
        }
    }
    let dups = deduplicate(timeline);
    correct_targets(&mut merges, &dups);
    merges
}

/// Drop events whose endpoints no longer exist in the (trimmed) timeline.
fn remove_orphans(events: &mut Vec<EdgeEvent>, timeline: &[DynamicCommunity]) {
    let steps: HashMap<&str, BTreeSet<u32>> = timeline
        .iter()
        .map(|d| (d.name.as_str(), d.steps.iter().map(|s| s.step).collect()))
        .collect();
    let exists = |e: &Endpoint| {
        steps
            .get(e.name.as_str())
            .is_some_and(|s| s.contains(&e.step))
    };
    events.retain(|e| exists(&e.source) && exists(&e.target));
}

fn find_births(timeline: &[DynamicCommunity]) -> Vec<PointEvent> {
    timeline
        .iter()
        .filter_map(|d| {
            Some(PointEvent {
                name: d.name.clone(),
                step: d.steps.first()?.step,
            })
        })
        .collect()
}

fn find_deaths(timeline: &[DynamicCommunity]) -> Vec<PointEvent> {
    timeline
        .iter()
        .filter_map(|d| {
            Some(PointEvent {
                name: d.name.clone(),
                step: d.steps.last()?.step,
            })
        })
        .collect()
}

/// One event per gap, at the first missing step.
fn find_intermittents(timeline: &[DynamicCommunity]) -> Vec<PointEvent> {
    timeline
        .iter()
        .flat_map(|d| {
            d.steps.windows(2).filter_map(|w| {
                (w[0].step + 1 != w[1].step).then(|| PointEvent {
                    name: d.name.clone(),
                    step: w[0].step + 1,
                })
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Step communities and size changes
// ---------------------------------------------------------------------------

/// step → community → users
type StepCommunities = BTreeMap<u32, BTreeMap<u32, Vec<u64>>>;

fn read_step_communities(dir: &Path) -> Result<StepCommunities> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "comm"))
        .collect();
    files.sort();

    let mut steps = StepCommunities::new();
    for (step, path) in (1u32..).zip(&files) {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        steps.insert(step, parse_communities(&text).with_context(|| format!("parsing {}", path.display()))?);
    }
    log::info!("Read {} step community files from {}", files.len(), dir.display());
    Ok(steps)
}

fn parse_communities(text: &str) -> Result<BTreeMap<u32, Vec<u64>>> {
    (1u32..)
        .zip(text.lines())
        .map(|(community, line)| {
            let users = line
                .split_whitespace()
                .map(|u| u.parse::<u64>().with_context(|| format!("community {community}: bad user id '{u}'")))
                .collect::<Result<Vec<u64>>>()?;
            Ok((community, users))
        })
        .collect()
}

fn community_size(steps: &StepCommunities, s: &TimelineStep) -> Result<usize> {
    match steps.get(&s.step).and_then(|c| c.get(&s.community)) {
        Some(users) => Ok(users.len()),
        None => bail!("no step community {}={}", s.step, s.community),
    }
}

#[derive(Debug, Clone, Copy)]
enum SizeChange {
    Expansion,
    Contraction,
}

/// Consecutive steps of one dynamic community whose size changes by more
/// than `threshold` (relative) in the given direction.
fn find_size_changes(
    timeline: &[DynamicCommunity],
    steps: &StepCommunities,
    threshold: f64,
    direction: SizeChange,
) -> Result<Vec<EdgeEvent>> {
    let mut events = Vec::new();
    for d in timeline {
        for w in d.steps.windows(2) {
            let c_i = community_size(steps, &w[0]).with_context(|| format!("dynamic community {}", d.name))?;
            let c_j = community_size(steps, &w[1]).with_context(|| format!("dynamic community {}", d.name))?;
            let (larger, smaller) = match direction {
                SizeChange::Expansion => (c_j, c_i),
                SizeChange::Contraction => (c_i, c_j),
            };
            if smaller == 0 || larger <= smaller {
                continue;
            }
            let change = larger as f64 / smaller as f64 - 1.0;
            if change > threshold {
                let mut event = EdgeEvent::new((d.name.as_str(), w[0].step), (d.name.as_str(), w[1].step));
                match direction {
                    SizeChange::Expansion => event.growth = Some(change),
                    SizeChange::Contraction => event.reduction = Some(change),
                }
                events.push(event);
            }
        }
    }
    Ok(events)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn detect_events(
    timeline: &mut Vec<DynamicCommunity>,
    steps: &StepCommunities,
    expansion_threshold: f64,
    contraction_threshold: f64,
) -> Result<TimelineEvents> {
    let mut splits = find_splits(timeline);
    let merges = find_merges(timeline);
    remove_orphans(&mut splits, timeline);
    Ok(TimelineEvents {
        splits,
        births: find_births(timeline),
        merges,
        deaths: find_deaths(timeline),
        intermittents: find_intermittents(timeline),
        expansions: find_size_changes(timeline, steps, expansion_threshold, SizeChange::Expansion)?,
        contractions: find_size_changes(timeline, steps, contraction_threshold, SizeChange::Contraction)?,
    })
}

fn open_reader(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(p) => Box::new(BufReader::new(
            File::open(p).with_context(|| format!("opening {}", p.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    })
}

fn open_writer(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("creating {}", p.display()))?,
        )),
        None => Box::new(io::stdout()),
    })
}

fn write_json(path: Option<&Path>, value: &impl Serialize) -> Result<()> {
    let mut writer = open_writer(path)?;
    serde_json::to_writer(&mut writer, value).context("writing JSON")?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut timeline = read_timeline(open_reader(args.timeline.as_deref())?)?;
    log::info!("Read {} dynamic communities", timeline.len());

    let steps = read_step_communities(&args.steps_dir)?;
    let events = detect_events(
        &mut timeline,
        &steps,
        args.expansion_threshold,
        args.contraction_threshold,
    )?;
    log::info!(
        "Found {} splits, {} merges, {} intermittents, {} expansions, {} contractions",
        events.splits.len(),
        events.merges.len(),
        events.intermittents.len(),
        events.expansions.len(),
        events.contractions.len()
    );

    write_json(args.output.as_deref(), &timeline)?;
    write_json(Some(args.events.as_path()), &events)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(lines: &[&str]) -> Vec<DynamicCommunity> {
        read_timeline(lines.join("\n").as_bytes()).unwrap()
    }

    fn names(timeline: &[DynamicCommunity]) -> Vec<&str> {
        timeline.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn parses_tracker_lines() {
        let d = DynamicCommunity::parse("D7:1=3,2=4").unwrap();
        assert_eq!(d.name, "D7");
        assert_eq!(
            d.steps,
            vec![
                TimelineStep { step: 1, community: 3 },
                TimelineStep { step: 2, community: 4 }
            ]
        );
        assert!(DynamicCommunity::parse("D7 1=3").is_err());
        assert!(DynamicCommunity::parse("D7:1-3").is_err());
    }

    #[test]
    fn split_trims_the_branch() {
        let mut tl = timeline(&["D1:1=1,2=1,3=1", "D2:1=1,2=2,3=2"]);
        let splits = find_splits(&mut tl);
        assert_eq!(splits, vec![EdgeEvent::new(("D1", 1), ("D2", 2))]);
        assert_eq!(tl[1].steps.first().map(|s| s.step), Some(2));
    }

    #[test]
    fn duplicate_branches_collapse_and_retarget() {
        let mut tl = timeline(&["D1:1=1,2=1,3=1", "D2:1=1,2=2", "D3:1=1,2=2"]);
        let splits = find_splits(&mut tl);
        assert_eq!(names(&tl), vec!["D1", "D2"]);
        assert_eq!(splits.len(), 2);
        assert!(splits.iter().all(|e| e.target.name == "D2"));
    }

    #[test]
    fn merge_trims_the_joining_community() {
        let mut tl = timeline(&["D1:1=1,2=1,3=1", "D2:1=2,2=2,3=1"]);
        let merges = find_merges(&mut tl);
        assert_eq!(merges, vec![EdgeEvent::new(("D2", 2), ("D1", 3))]);
        assert_eq!(tl[1].steps.last().map(|s| s.step), Some(2));
    }

    #[test]
    fn births_deaths_and_gaps() {
        let tl = timeline(&["D1:1=1,3=1,4=2", "D2:2=5"]);
        let point = |name: &str, step| PointEvent { name: name.into(), step };
        assert_eq!(find_births(&tl), vec![point("D1", 1), point("D2", 2)]);
        assert_eq!(find_deaths(&tl), vec![point("D1", 4), point("D2", 2)]);
        assert_eq!(find_intermittents(&tl), vec![point("D1", 2)]);
    }

    #[test]
    fn orphaned_splits_are_removed() {
        let tl = timeline(&["D1:1=1,2=1"]);
        let mut events = vec![
            EdgeEvent::new(("D1", 1), ("D1", 2)),
            EdgeEvent::new(("D1", 1), ("D9", 2)),
            EdgeEvent::new(("D1", 5), ("D1", 2)),
        ];
        remove_orphans(&mut events, &tl);
        assert_eq!(events, vec![EdgeEvent::new(("D1", 1), ("D1", 2))]);
    }

    #[test]
    fn size_changes_respect_threshold() {
        let steps: StepCommunities = BTreeMap::from([
            (1, parse_communities("1 2 3 4\n5 6").unwrap()),
            (2, parse_communities("1 2 3 4 5\n5 6 7 8").unwrap()),
            (3, parse_communities("1 2").unwrap()),
        ]);
        let tl = timeline(&["D1:1=1,2=1,3=1", "D2:1=2,2=2"]);

        let expansions = find_size_changes(&tl, &steps, 0.10, SizeChange::Expansion).unwrap();
        assert_eq!(expansions.len(), 2);
        assert_eq!(expansions[0].growth, Some(0.25));
        assert_eq!(expansions[1].growth, Some(1.0));

        let strict = find_size_changes(&tl, &steps, 0.5, SizeChange::Expansion).unwrap();
        assert_eq!(strict.len(), 1);

        let contractions = find_size_changes(&tl, &steps, 0.10, SizeChange::Contraction).unwrap();
        assert_eq!(contractions.len(), 1);
        assert_eq!(contractions[0].reduction, Some(1.5));
        assert_eq!(contractions[0].source, Endpoint { name: "D1".into(), step: 2 });
    }

    #[test]
    fn unknown_step_community_is_an_error() {
        let steps: StepCommunities = BTreeMap::from([(1, parse_communities("1 2").unwrap())]);
        let tl = timeline(&["D1:1=1,2=1"]);
        assert!(find_size_changes(&tl, &steps, 0.1, SizeChange::Expansion).is_err());
    }

    #[test]
    fn events_serialise_in_viewer_shape() {
        let mut event = EdgeEvent::new(("D1", 1), ("D1", 2));
        event.growth = Some(0.5);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"source": {"name": "D1", "step": 1}, "target": {"name": "D1", "step": 2}, "growth": 0.5})
        );

        let tl = timeline(&["D1:1=2"]);
        assert_eq!(
            serde_json::to_value(&tl).unwrap(),
            serde_json::json!([{"name": "D1", "data": [{"step": 1, "community": 2}]}])
        );
    }
}
