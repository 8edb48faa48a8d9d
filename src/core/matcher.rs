use rayon::prelude::*;
use serde::Serialize;

use crate::core::compare::{self, Tolerance};
use crate::core::config::Config;
use crate::core::fingerprint::Fingerprint;

/// Which side of the normalized raster dominates; renderers size previews by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn of(width: u32, height: u32) -> Self {
        if width >= height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// One entry of a match list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Peer {
    pub path: String,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub path: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub fingerprint: Fingerprint,
    /// Filled in by [`Matcher::match_all`]; always contains the record itself.
    pub matches: Vec<Peer>,
}

impl ImageRecord {
    pub fn new(path: String, width: u32, height: u32, fingerprint: Fingerprint) -> Self {
        let mut record = Self {
            path,
            width,
            height,
            fingerprint,
            matches: Vec::new(),
        };
        record.matches.push(record.peer());
        record
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::of(self.width, self.height)
    }

    pub fn peer(&self) -> Peer {
        Peer {
            path: self.path.clone(),
            orientation: self.orientation(),
        }
    }

    pub fn has_duplicates(&self) -> bool {
        self.matches.iter().any(|peer| peer.path != self.path)
    }
}

/// All-pairs matching over a fully extracted corpus.
pub struct Matcher {
    tolerance: Tolerance,
}

impl Matcher {
    pub fn new(config: &Config) -> Self {
        Self {
            tolerance: config.tolerance(),
        }
    }

    pub fn is_match(&self, a: &ImageRecord, b: &ImageRecord) -> bool {
        compare::might_be_similar(&a.fingerprint, &b.fingerprint, self.tolerance)
            && compare::similar(&a.fingerprint, &b.fingerprint, self.tolerance)
    }

    /// Match list of `record` against `corpus`: the record itself plus every
    /// similar record at another path, sorted descending and de-duplicated.
    pub fn matches_for(&self, record: &ImageRecord, corpus: &[ImageRecord]) -> Vec<Peer> {
        let mut peers = vec![record.peer()];
        peers.extend(
            corpus
                .iter()
                .filter(|other| other.path != record.path)
                .filter(|other| self.is_match(record, other))
                .map(ImageRecord::peer),
        );
        peers.sort_unstable_by(|a, b| b.cmp(a));
        peers.dedup();
        peers
    }

    /// Computes every record's match list in parallel. Workers only read the
    /// corpus; the lists are handed back and attached afterwards.
    pub fn match_all(&self, records: Vec<ImageRecord>) -> Vec<ImageRecord> {
        let lists: Vec<Vec<Peer>> = records
            .par_iter()
            .map(|record| self.matches_for(record, &records))
            .collect();

        let matched = lists.iter().filter(|list| list.len() > 1).count();
        log::info!(
            "matched {} images, {} with at least one similar peer",
            records.len(),
            matched
        );

        records
            .into_iter()
            .zip(lists)
            .map(|(mut record, matches)| {
                record.matches = matches;
                record
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::Extractor;
    use image::{ImageBuffer, Rgb, RgbImage};

    fn scene(width: u32, height: u32, shift: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 3 + shift) % 200 + 20) as u8,
                ((y * 5 + shift) % 200 + 20) as u8,
                ((x + y + shift) % 200 + 20) as u8,
            ])
        })
    }

    fn record(path: &str, raster: &RgbImage) -> ImageRecord {
        let extractor = Extractor::new(&Config::default());
        ImageRecord::new(
            path.to_string(),
            raster.width(),
            raster.height(),
            extractor.extract(raster),
        )
    }

    fn paths(peers: &[Peer]) -> Vec<&str> {
        peers.iter().map(|peer| peer.path.as_str()).collect()
    }

    #[test]
    fn test_orientation() {
        assert_eq!(Orientation::of(250, 140), Orientation::Landscape);
        assert_eq!(Orientation::of(250, 250), Orientation::Landscape);
        assert_eq!(Orientation::of(140, 250), Orientation::Portrait);
    }

    #[test]
    fn test_new_record_lists_itself() {
        let r = record("a.jpg", &scene(250, 140, 0));
        assert_eq!(paths(&r.matches), vec!["a.jpg"]);
        assert!(!r.has_duplicates());
    }

    #[test]
    fn test_identical_images_match_each_other() {
        let raster = scene(250, 140, 0);
        let records = vec![record("a.jpg", &raster), record("b.jpg", &raster)];

        let matched = Matcher::new(&Config::default()).match_all(records);
        assert_eq!(paths(&matched[0].matches), vec!["b.jpg", "a.jpg"]);
        assert_eq!(paths(&matched[1].matches), vec!["b.jpg", "a.jpg"]);
        assert!(matched.iter().all(ImageRecord::has_duplicates));
    }

    #[test]
    fn test_dissimilar_images_stay_apart() {
        let records = vec![
            record("a.jpg", &scene(250, 140, 0)),
            record("b.jpg", &scene(250, 140, 97)),
        ];

        let matched = Matcher::new(&Config::default()).match_all(records);
        assert_eq!(paths(&matched[0].matches), vec!["a.jpg"]);
        assert_eq!(paths(&matched[1].matches), vec!["b.jpg"]);
    }

    #[test]
    fn test_single_image_corpus() {
        let records = vec![record("only.jpg", &scene(200, 250, 3))];
        let matched = Matcher::new(&Config::default()).match_all(records);

        assert_eq!(matched.len(), 1);
        assert_eq!(paths(&matched[0].matches), vec!["only.jpg"]);
        assert_eq!(matched[0].matches[0].orientation, Orientation::Portrait);
    }

    #[test]
    fn test_same_path_listed_once() {
        let raster = scene(250, 140, 0);
        let records = vec![record("dup.jpg", &raster), record("dup.jpg", &raster)];

        let matched = Matcher::new(&Config::default()).match_all(records);
        for r in &matched {
            assert_eq!(paths(&r.matches), vec!["dup.jpg"]);
        }
    }

    #[test]
    fn test_match_lists_are_symmetric_and_order_independent() {
        let a = scene(250, 140, 0);
        let c = scene(250, 140, 150);
        let records = vec![
            record("c.jpg", &c),
            record("a.jpg", &a),
            record("b.jpg", &a),
            record("d.jpg", &c),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let matcher = Matcher::new(&Config::default());
        let forward = matcher.match_all(records);
        let backward = matcher.match_all(reversed);

        for r in &forward {
            for peer in &r.matches {
                let other = forward.iter().find(|o| o.path == peer.path).unwrap();
                assert!(other.matches.iter().any(|p| p.path == r.path));
            }
            let twin = backward.iter().find(|o| o.path == r.path).unwrap();
            assert_eq!(r.matches, twin.matches);
        }

        let a_record = forward.iter().find(|r| r.path == "a.jpg").unwrap();
        assert_eq!(paths(&a_record.matches), vec!["b.jpg", "a.jpg"]);
    }
}
