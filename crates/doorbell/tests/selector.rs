//! Selection rounds over real directories.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use doorbell::{DoorbellError, SoundSelector};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn populate(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), b"RIFF").unwrap();
    }
}

#[test]
fn test_two_files_and_a_hidden_one() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path(), &["a.wav", "b.wav", ".hidden.wav"]);

    let mut selector = SoundSelector::new();
    let first = selector.pick(dir.path()).unwrap();
    let second = selector.pick(dir.path()).unwrap();

    assert_ne!(first, second);
    let picked: HashSet<PathBuf> = [first, second].into_iter().collect();
    let expected: HashSet<PathBuf> = [dir.path().join("a.wav"), dir.path().join("b.wav")]
        .into_iter()
        .collect();
    assert_eq!(picked, expected);
}

#[test]
fn test_every_round_covers_the_pool_without_repeats() {
    let dir = tempfile::tempdir().unwrap();
    let names: Vec<String> = (0..7).map(|i| format!("chime-{}.mp3", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    populate(dir.path(), &refs);
    populate(dir.path(), &[".DS_Store", ".chime-0.mp3.swp"]);

    for seed in 0..20 {
        let mut selector = SoundSelector::with_rng(StdRng::seed_from_u64(seed));
        for _round in 0..3 {
            let round: HashSet<PathBuf> = (0..names.len())
                .map(|_| selector.pick(dir.path()).unwrap())
                .collect();
            assert_eq!(round.len(), names.len(), "seed {} repeated within a round", seed);
            assert!(round
                .iter()
                .all(|p| !p.file_name().unwrap().to_string_lossy().starts_with('.')));
        }
    }
}

#[test]
fn test_pick_after_round_may_repeat() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path(), &["a.wav", "b.wav"]);

    let mut selector = SoundSelector::with_rng(StdRng::seed_from_u64(1));
    let round: Vec<PathBuf> = (0..2).map(|_| selector.pick(dir.path()).unwrap()).collect();
    let next = selector.pick(dir.path()).unwrap();

    assert!(round.contains(&next));
    assert_eq!(selector.played().len(), 1);
}

#[test]
fn test_single_file_source() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path(), &["chime.wav"]);
    let chime = dir.path().join("chime.wav");

    let mut selector = SoundSelector::new();
    for _ in 0..4 {
        assert_eq!(selector.pick(&chime).unwrap(), chime);
    }
}

#[test]
fn test_error_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let mut selector = SoundSelector::new();

    assert!(matches!(
        selector.pick(Path::new("")),
        Err(DoorbellError::InvalidInput(_))
    ));
    assert!(matches!(
        selector.pick(&dir.path().join("missing")),
        Err(DoorbellError::NotFound(_))
    ));
    assert!(matches!(
        selector.pick(dir.path()),
        Err(DoorbellError::NoCandidates(_))
    ));
}

#[cfg(unix)]
#[test]
fn test_symlinked_file_is_a_candidate() {
    let target_dir = tempfile::tempdir().unwrap();
    populate(target_dir.path(), &["real.wav"]);

    let dir = tempfile::tempdir().unwrap();
    let link = dir.path().join("link.wav");
    std::os::unix::fs::symlink(target_dir.path().join("real.wav"), &link).unwrap();

    let mut selector = SoundSelector::new();
    assert_eq!(selector.pick(dir.path()).unwrap(), link);
}
