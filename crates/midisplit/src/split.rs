//! Round-robin track partitioning.

use std::path::Path;

use midly::{Format, Header, Smf};

use crate::timeline::{conductor_track, extract_timeline, metrical_ppq, strip_timeline};
use crate::SplitError;

/// One performer's part: a complete Standard MIDI File plus its identity
/// within the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Performer index, `0..N-1`.
    pub index: usize,
    /// Derived file name, `<song>-<index>.mid`.
    pub name: String,
    /// The serialized MIDI file.
    pub bytes: Vec<u8>,
}

/// Split a song file on disk into `performers` parts.
///
/// The song name embedded in part names is the file stem.
pub fn split_file(path: &Path, performers: usize) -> Result<Vec<Part>, SplitError> {
    let bytes = std::fs::read(path)?;
    let song = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "song".to_string());
    split(&song, &bytes, performers)
}

/// Split raw MIDI bytes into `performers` parts.
///
/// Source track `i` is assigned to part `i mod performers`. Every part is a
/// format-1 file whose track 0 is the conductor track (tempo map at the
/// source's ticks-per-beat); assigned tracks follow with their timeline
/// metas stripped. Deterministic: equal `(song, bytes, performers)` yields
/// byte-identical parts.
pub fn split(song: &str, bytes: &[u8], performers: usize) -> Result<Vec<Part>, SplitError> {
    if performers < 1 {
        return Err(SplitError::NoPerformers(performers));
    }

    let smf = Smf::parse(bytes)?;
    metrical_ppq(&smf)?;

    let timeline = extract_timeline(&smf);
    let conductor = conductor_track(&timeline);

    let mut assignments: Vec<Vec<usize>> = vec![Vec::new(); performers];
    for track_index in 0..smf.tracks.len() {
        assignments[track_index % performers].push(track_index);
    }

    let header = Header::new(Format::Parallel, smf.header.timing);
    let mut parts = Vec::with_capacity(performers);

    for (index, track_indices) in assignments.iter().enumerate() {
        let mut tracks = Vec::with_capacity(1 + track_indices.len());
        tracks.push(conductor.clone());
        for &t in track_indices {
            tracks.push(strip_timeline(&smf.tracks[t]));
        }

        let part_smf = Smf { header, tracks };
        let mut part_bytes = Vec::new();
        part_smf.write_std(&mut part_bytes)?;

        parts.push(Part {
            index,
            name: format!("{}-{}.mid", song, index),
            bytes: part_bytes,
        });
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{MetaMessage, MidiMessage, Timing, TrackEvent, TrackEventKind};
    use pretty_assertions::assert_eq;

    /// A 4-beat source with one track per pitch, plus a tempo at tick 0.
    fn source_song(pitches: &[u8]) -> Vec<u8> {
        let header = Header::new(Format::Parallel, Timing::Metrical(u15::new(480)));
        let mut tracks = Vec::new();

        for (i, &pitch) in pitches.iter().enumerate() {
            let mut track = Vec::new();
            if i == 0 {
                track.push(TrackEvent {
                    delta: u28::new(0),
                    kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(600_000))),
                });
            }
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel: u4::new(0),
                    message: MidiMessage::NoteOn {
                        key: u7::new(pitch),
                        vel: u7::new(100),
                    },
                },
            });
            track.push(TrackEvent {
                delta: u28::new(1920),
                kind: TrackEventKind::Midi {
                    channel: u4::new(0),
                    message: MidiMessage::NoteOff {
                        key: u7::new(pitch),
                        vel: u7::new(0),
                    },
                },
            });
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            });
            tracks.push(track);
        }

        let smf = Smf { header, tracks };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    fn note_on_pitches(smf: &Smf) -> Vec<u8> {
        let mut pitches = Vec::new();
        for track in &smf.tracks {
            for event in track {
                if let TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, vel },
                    ..
                } = event.kind
                {
                    if vel.as_int() > 0 {
                        pitches.push(key.as_int());
                    }
                }
            }
        }
        pitches
    }

    fn tempo_events(smf: &Smf) -> Vec<(usize, u32)> {
        let mut tempos = Vec::new();
        for (i, track) in smf.tracks.iter().enumerate() {
            for event in track {
                if let TrackEventKind::Meta(MetaMessage::Tempo(t)) = event.kind {
                    tempos.push((i, t.as_int()));
                }
            }
        }
        tempos
    }

    #[test]
    fn three_tracks_two_performers() {
        let bytes = source_song(&[60, 64, 67]);
        let parts = split("waltz", &bytes, 2).unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "waltz-0.mid");
        assert_eq!(parts[1].name, "waltz-1.mid");
        assert_eq!((parts[0].index, parts[1].index), (0, 1));

        let part0 = Smf::parse(&parts[0].bytes).unwrap();
        let part1 = Smf::parse(&parts[1].bytes).unwrap();

        // Round-robin: tracks {0,2} and {1}, each behind a conductor track
        assert_eq!(part0.tracks.len(), 3);
        assert_eq!(part1.tracks.len(), 2);
        assert_eq!(note_on_pitches(&part0), vec![60, 67]);
        assert_eq!(note_on_pitches(&part1), vec![64]);
    }

    #[test]
    fn parts_share_tempo_map_and_resolution() {
        let bytes = source_song(&[60, 64, 67]);
        let parts = split("waltz", &bytes, 2).unwrap();

        let part0 = Smf::parse(&parts[0].bytes).unwrap();
        let part1 = Smf::parse(&parts[1].bytes).unwrap();

        assert_eq!(part0.header.timing, part1.header.timing);
        assert_eq!(
            part0.header.timing,
            Timing::Metrical(u15::new(480)),
            "resolution must match the source"
        );

        // Tempo lives only in the conductor track of each part
        assert_eq!(tempo_events(&part0), vec![(0, 600_000)]);
        assert_eq!(tempo_events(&part1), vec![(0, 600_000)]);
    }

    #[test]
    fn split_is_deterministic() {
        let bytes = source_song(&[60, 64, 67, 72]);
        let first = split("etude", &bytes, 3).unwrap();
        let second = split("etude", &bytes, 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn more_performers_than_tracks_yields_silent_parts() {
        let bytes = source_song(&[60, 64]);
        let parts = split("duet", &bytes, 5).unwrap();

        assert_eq!(parts.len(), 5);
        for part in &parts[2..] {
            let smf = Smf::parse(&part.bytes).expect("silent part must still be valid MIDI");
            assert_eq!(smf.tracks.len(), 1, "conductor track only");
            assert!(note_on_pitches(&smf).is_empty());
            assert_eq!(tempo_events(&smf), vec![(0, 600_000)]);
        }
    }

    #[test]
    fn every_part_is_independently_parseable() {
        let bytes = source_song(&[60, 62, 64, 65, 67]);
        for n in 1..=7 {
            let parts = split("scale", &bytes, n).unwrap();
            assert_eq!(parts.len(), n);
            for part in &parts {
                Smf::parse(&part.bytes).expect("every part must parse");
            }
        }
    }

    #[test]
    fn zero_performers_is_an_error() {
        let bytes = source_song(&[60]);
        let err = split("solo", &bytes, 0).unwrap_err();
        assert!(matches!(err, SplitError::NoPerformers(0)));
    }

    #[test]
    fn garbage_input_is_malformed() {
        let err = split("noise", b"this is not a midi file", 2).unwrap_err();
        assert!(matches!(err, SplitError::Malformed(_)));
    }

    #[test]
    fn split_file_uses_the_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nocturne.mid");
        std::fs::write(&path, source_song(&[60, 64])).unwrap();

        let parts = split_file(&path, 2).unwrap();
        assert_eq!(parts[0].name, "nocturne-0.mid");
        assert_eq!(parts[1].name, "nocturne-1.mid");
    }
}
