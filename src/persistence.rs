//! Persistence interface (spec.md §4.11, C11).
//!
//! The core spec treats save/load as opaque ok/err operations; this is the
//! one concrete on-disk format behind them. Fixed layout, little-endian,
//! no compression — matches the framed wire codec's "explicit fixed-width
//! integers, no reliance on native representations" convention.

use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::aggregate::Aggregate;
use crate::context::Config;
use crate::error::ControlError;
use crate::grid::World;
use crate::grid::WorldKind;
use crate::trajectory::MoveProbs;

const MAGIC: [u8; 4] = *b"WSIM";
const VERSION: u16 = 1;

pub struct LoadedWorld {
    pub kind: WorldKind,
    pub width: u32,
    pub height: u32,
    pub world: World,
}

pub struct LoadedResults {
    pub kind: WorldKind,
    pub width: u32,
    pub height: u32,
    pub probs: MoveProbs,
    pub k: u64,
    pub total_reps: u64,
    pub world: World,
    pub aggregate: Aggregate,
}

pub fn save_results(
    path: &Path,
    config: &Config,
    world: &World,
    aggregate: &Aggregate,
) -> Result<(), ControlError> {
    write_file(path, config, world, aggregate).map_err(|_| ControlError::SaveFailure)
}

pub fn load_results(path: &Path) -> Result<LoadedResults, ControlError> {
    read_file(path).map_err(|_| ControlError::LoadFailure)
}

pub fn load_world(path: &Path) -> Result<LoadedWorld, ControlError> {
    let loaded = read_file(path).map_err(|_| ControlError::LoadWorld)?;
    Ok(LoadedWorld {
        kind: loaded.kind,
        width: loaded.width,
        height: loaded.height,
        world: loaded.world,
    })
}

fn write_file(
    path: &Path,
    config: &Config,
    world: &World,
    aggregate: &Aggregate,
) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    w.write_all(&MAGIC)?;
    w.write_u16::<LittleEndian>(VERSION)?;
    w.write_u8(config.kind.wire())?;
    w.write_u32::<LittleEndian>(config.width)?;
    w.write_u32::<LittleEndian>(config.height)?;
    w.write_f64::<LittleEndian>(config.probs.up)?;
    w.write_f64::<LittleEndian>(config.probs.down)?;
    w.write_f64::<LittleEndian>(config.probs.left)?;
    w.write_f64::<LittleEndian>(config.probs.right)?;
    w.write_u64::<LittleEndian>(config.k)?;
    w.write_u64::<LittleEndian>(config.total_reps)?;
    w.write_all(world.obstacles())?;
    for v in aggregate.trials() {
        w.write_u32::<LittleEndian>(v)?;
    }
    for v in aggregate.sum_steps() {
        w.write_u64::<LittleEndian>(v)?;
    }
    for v in aggregate.successes() {
        w.write_u32::<LittleEndian>(v)?;
    }
    w.flush()
}

fn read_file(path: &Path) -> std::io::Result<LoadedResults> {
    let file = File::open(path)?;
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad magic"));
    }
    let _version = r.read_u16::<LittleEndian>()?;
    let kind_byte = r.read_u8()?;
    let kind = WorldKind::from_wire(kind_byte)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "bad world kind"))?;
    let width = r.read_u32::<LittleEndian>()?;
    let height = r.read_u32::<LittleEndian>()?;
    let probs = MoveProbs {
        up: r.read_f64::<LittleEndian>()?,
        down: r.read_f64::<LittleEndian>()?,
        left: r.read_f64::<LittleEndian>()?,
        right: r.read_f64::<LittleEndian>()?,
    };
    let k = r.read_u64::<LittleEndian>()?;
    let total_reps = r.read_u64::<LittleEndian>()?;

    let cell_count = width as usize * height as usize;
    let mut world = World::init(kind, width, height);
    {
        let obstacles = world.obstacles_mut();
        r.read_exact(obstacles)?;
    }

    let mut trials = vec![0u32; cell_count];
    for slot in trials.iter_mut() {
        *slot = r.read_u32::<LittleEndian>()?;
    }
    let mut sum_steps = vec![0u64; cell_count];
    for slot in sum_steps.iter_mut() {
        *slot = r.read_u64::<LittleEndian>()?;
    }
    let mut successes = vec![0u32; cell_count];
    for slot in successes.iter_mut() {
        *slot = r.read_u32::<LittleEndian>()?;
    }
    let aggregate = Aggregate::from_raw(trials, sum_steps, successes);

    Ok(LoadedResults {
        kind,
        width,
        height,
        probs,
        k,
        total_reps,
        world,
        aggregate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::WorldKind;
    use tempfile::NamedTempFile;

    fn uniform() -> MoveProbs {
        MoveProbs {
            up: 0.25,
            down: 0.25,
            left: 0.25,
            right: 0.25,
        }
    }

    #[test]
    fn save_then_load_round_trips_geometry_and_totals() {
        let world = World::init(WorldKind::Wrap, 3, 3);
        let aggregate = Aggregate::init(3, 3);
        aggregate.update(0, 0, true, true);
        aggregate.update(1, 4, true, true);
        aggregate.update(1, 0, false, false);

        let config = Config {
            kind: WorldKind::Wrap,
            width: 3,
            height: 3,
            probs: uniform(),
            k: 16,
            total_reps: 2,
            multi_user: false,
            obstacle_percent: 0,
            obstacle_seed: 0,
            workers: 2,
            queue_capacity: 16,
        };

        let file = NamedTempFile::new().unwrap();
        save_results(file.path(), &config, &world, &aggregate).unwrap();

        let loaded = load_results(file.path()).unwrap();
        assert_eq!(loaded.kind, WorldKind::Wrap);
        assert_eq!(loaded.width, 3);
        assert_eq!(loaded.height, 3);
        assert_eq!(loaded.k, 16);
        assert_eq!(loaded.total_reps, 2);
        assert_eq!(loaded.aggregate.trials_at(0), 1);
        assert_eq!(loaded.aggregate.trials_at(1), 2);
        assert_eq!(loaded.aggregate.successes_at(1), 1);
        assert_eq!(loaded.aggregate.sum_steps_at(1), 4);
    }

    #[test]
    fn load_world_ignores_aggregate_fields() {
        let world = World::init(WorldKind::Obstacles, 4, 4);
        let aggregate = Aggregate::init(4, 4);
        let config = Config {
            kind: WorldKind::Obstacles,
            width: 4,
            height: 4,
            probs: uniform(),
            k: 8,
            total_reps: 1,
            multi_user: false,
            obstacle_percent: 0,
            obstacle_seed: 0,
            workers: 1,
            queue_capacity: 16,
        };
        let file = NamedTempFile::new().unwrap();
        save_results(file.path(), &config, &world, &aggregate).unwrap();

        let loaded = load_world(file.path()).unwrap();
        assert_eq!(loaded.kind, WorldKind::Obstacles);
        assert_eq!(loaded.width, 4);
        assert_eq!(loaded.height, 4);
    }

    #[test]
    fn bad_magic_is_a_load_failure() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a wandersim file").unwrap();
        let err = load_results(file.path()).err().unwrap();
        assert_eq!(err, ControlError::LoadFailure);
    }

    #[test]
    fn missing_file_is_a_load_world_failure() {
        let err = load_world(Path::new("/nonexistent/wandersim.save")).err().unwrap();
        assert_eq!(err, ControlError::LoadWorld);
    }
}
