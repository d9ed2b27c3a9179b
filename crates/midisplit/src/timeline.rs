//! Tempo map extraction and the synthesized conductor track.
//!
//! The conductor track is what keeps N parts time-synchronized: every part
//! gets a copy of it as track 0, carrying the song's tempo, time signature,
//! and key signature changes at their original absolute ticks.

use midly::num::{u24, u28};
use midly::{MetaMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};

use crate::SplitError;

/// Largest delta-time a single track event can carry.
const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// Default tempo when a song declares none: 120 BPM.
const DEFAULT_TEMPO: u32 = 500_000;

/// A timeline-shaping meta event at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimelineEvent {
    /// Microseconds per beat.
    Tempo(u32),
    /// Numerator, denominator power of two, MIDI clocks per click,
    /// 32nd notes per beat.
    TimeSignature(u8, u8, u8, u8),
    /// Sharps/flats count and minor flag.
    KeySignature(i8, bool),
}

/// Resolve the source's ticks-per-beat, rejecting SMPTE-timed files.
///
/// The ensemble timeline is defined in beats; re-timing SMPTE sources
/// would silently change their playback, so they are refused instead.
pub(crate) fn metrical_ppq(smf: &Smf) -> Result<u16, SplitError> {
    match smf.header.timing {
        Timing::Metrical(ppq) => Ok(ppq.as_int()),
        Timing::Timecode(..) => Err(SplitError::Unsupported(
            "SMPTE timecode division (only ticks-per-beat files can be split)",
        )),
    }
}

/// Collect tempo/time-signature/key-signature events from every track,
/// at absolute ticks, in tick order.
pub(crate) fn extract_timeline(smf: &Smf) -> Vec<(u64, TimelineEvent)> {
    let mut events = Vec::new();

    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                    events.push((tick, TimelineEvent::Tempo(t.as_int())));
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(n, d, c, b)) => {
                    events.push((tick, TimelineEvent::TimeSignature(n, d, c, b)));
                }
                TrackEventKind::Meta(MetaMessage::KeySignature(sf, minor)) => {
                    events.push((tick, TimelineEvent::KeySignature(sf, minor)));
                }
                _ => {}
            }
        }
    }

    events.sort_by_key(|(tick, _)| *tick);
    events
}

/// Build the conductor track from an extracted timeline.
///
/// Emits a default 120 BPM tempo if the song declares none, so every part
/// has a complete timeline of its own.
pub(crate) fn conductor_track(timeline: &[(u64, TimelineEvent)]) -> Track<'static> {
    let mut metas: Vec<(u64, MetaMessage<'static>)> = Vec::with_capacity(timeline.len() + 1);

    if !timeline
        .iter()
        .any(|(_, e)| matches!(e, TimelineEvent::Tempo(_)))
    {
        metas.push((0, MetaMessage::Tempo(u24::new(DEFAULT_TEMPO))));
    }

    for (tick, event) in timeline {
        let meta = match *event {
            TimelineEvent::Tempo(uspb) => MetaMessage::Tempo(u24::new(uspb)),
            TimelineEvent::TimeSignature(n, d, c, b) => MetaMessage::TimeSignature(n, d, c, b),
            TimelineEvent::KeySignature(sf, minor) => MetaMessage::KeySignature(sf, minor),
        };
        metas.push((*tick, meta));
    }

    metas.sort_by_key(|(tick, _)| *tick);

    let mut track = Vec::with_capacity(metas.len() + 2);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(b"conductor")),
    });

    let mut last = 0u64;
    for (tick, meta) in metas {
        let delta = (tick - last).min(MAX_DELTA) as u32;
        track.push(TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(meta),
        });
        last = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    track
}

/// Copy a source track, dropping the timeline metas that now live in the
/// conductor track. Deltas are rebuilt from absolute ticks so removing an
/// event never shifts its neighbors.
pub(crate) fn strip_timeline<'a>(track: &Track<'a>) -> Track<'a> {
    let mut events: Track<'a> = Vec::with_capacity(track.len());
    let mut tick = 0u64;
    let mut last = 0u64;

    for event in track {
        tick += event.delta.as_int() as u64;
        if matches!(
            event.kind,
            TrackEventKind::Meta(MetaMessage::Tempo(_))
                | TrackEventKind::Meta(MetaMessage::TimeSignature(..))
                | TrackEventKind::Meta(MetaMessage::KeySignature(..))
        ) {
            continue;
        }

        let delta = (tick - last).min(MAX_DELTA) as u32;
        events.push(TrackEvent {
            delta: u28::new(delta),
            kind: event.kind,
        });
        last = tick;
    }

    let ends_properly = matches!(
        events.last().map(|e| e.kind),
        Some(TrackEventKind::Meta(MetaMessage::EndOfTrack))
    );
    if !ends_properly {
        events.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
    }

    events
}

/// Song length derived from the tempo map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SongDuration {
    /// Total length in ticks (longest track).
    pub ticks: u64,
    /// Total length in beats.
    pub beats: f64,
    /// Approximate length in seconds, walking the tempo map.
    pub seconds: f64,
}

/// Compute a song's duration from its tempo map and longest track.
pub fn song_duration(bytes: &[u8]) -> Result<SongDuration, SplitError> {
    let smf = Smf::parse(bytes)?;
    let ppq = metrical_ppq(&smf)? as u64;

    let mut total_ticks = 0u64;
    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta.as_int() as u64;
        }
        total_ticks = total_ticks.max(tick);
    }

    let mut tempo_changes: Vec<(u64, u32)> = extract_timeline(&smf)
        .into_iter()
        .filter_map(|(tick, e)| match e {
            TimelineEvent::Tempo(uspb) => Some((tick, uspb)),
            _ => None,
        })
        .collect();
    tempo_changes.retain(|(tick, _)| *tick <= total_ticks);

    let mut seconds = 0f64;
    let mut cursor = 0u64;
    let mut uspb = DEFAULT_TEMPO;
    for (tick, next_uspb) in tempo_changes {
        seconds += (tick - cursor) as f64 / ppq as f64 * uspb as f64 / 1_000_000.0;
        cursor = tick;
        uspb = next_uspb;
    }
    seconds += (total_ticks - cursor) as f64 / ppq as f64 * uspb as f64 / 1_000_000.0;

    Ok(SongDuration {
        ticks: total_ticks,
        beats: total_ticks as f64 / ppq as f64,
        seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u4, u7};
    use midly::{Format, Header, MidiMessage};

    fn note(delta: u32, key: u8, on: bool) -> TrackEvent<'static> {
        let message = if on {
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(100),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            }
        };
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message,
            },
        }
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(message),
        }
    }

    fn encode(smf: &Smf) -> Vec<u8> {
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn timeline_collects_across_tracks_in_tick_order() {
        let header = Header::new(Format::Parallel, Timing::Metrical(u15::new(480)));
        let smf = Smf {
            header,
            tracks: vec![
                vec![
                    meta(0, MetaMessage::Tempo(u24::new(500_000))),
                    meta(960, MetaMessage::Tempo(u24::new(400_000))),
                    meta(0, MetaMessage::EndOfTrack),
                ],
                vec![
                    meta(480, MetaMessage::TimeSignature(3, 2, 24, 8)),
                    meta(0, MetaMessage::EndOfTrack),
                ],
            ],
        };

        let timeline = extract_timeline(&smf);
        assert_eq!(
            timeline,
            vec![
                (0, TimelineEvent::Tempo(500_000)),
                (480, TimelineEvent::TimeSignature(3, 2, 24, 8)),
                (960, TimelineEvent::Tempo(400_000)),
            ]
        );
    }

    #[test]
    fn conductor_defaults_to_120_bpm() {
        let track = conductor_track(&[]);
        let has_default_tempo = track.iter().any(|e| {
            matches!(
                e.kind,
                TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == DEFAULT_TEMPO
            )
        });
        assert!(has_default_tempo);
        assert!(matches!(
            track.last().map(|e| e.kind),
            Some(TrackEventKind::Meta(MetaMessage::EndOfTrack))
        ));
    }

    #[test]
    fn strip_preserves_note_positions() {
        let track = vec![
            note(0, 60, true),
            meta(240, MetaMessage::Tempo(u24::new(400_000))),
            note(240, 60, false),
            meta(0, MetaMessage::EndOfTrack),
        ];

        let stripped = strip_timeline(&track);

        // Tempo removed, note-off still lands at absolute tick 480
        assert_eq!(stripped.len(), 3);
        assert_eq!(stripped[1].delta.as_int(), 480);
        assert!(matches!(
            stripped[1].kind,
            TrackEventKind::Midi {
                message: MidiMessage::NoteOff { .. },
                ..
            }
        ));
    }

    #[test]
    fn duration_walks_tempo_map() {
        // 4 beats at 120 BPM then 4 beats at 60 BPM = 2s + 4s
        let header = Header::new(Format::Parallel, Timing::Metrical(u15::new(480)));
        let smf = Smf {
            header,
            tracks: vec![vec![
                meta(0, MetaMessage::Tempo(u24::new(500_000))),
                meta(1920, MetaMessage::Tempo(u24::new(1_000_000))),
                meta(1920, MetaMessage::EndOfTrack),
            ]],
        };

        let duration = song_duration(&encode(&smf)).unwrap();
        assert_eq!(duration.ticks, 3840);
        assert!((duration.beats - 8.0).abs() < 1e-9);
        assert!((duration.seconds - 6.0).abs() < 1e-9);
    }
}
