//! Note and controller events rendered as per-voice control signals.

use crate::processor::{Inputs, ProcessContext, Processor};
use crate::signal::SignalBuffer;

/// Output names of [`EventsToSignals`], in port order.
pub const EVENT_OUTPUTS: &[&str] = &[
    "pitch",
    "gate",
    "velocity",
    "aftertouch",
    "mod",
    "pitch_bend",
    "voice",
];

const OUT_PITCH: usize = 0;
const OUT_GATE: usize = 1;
const OUT_VELOCITY: usize = 2;
const OUT_AFTERTOUCH: usize = 3;
const OUT_MOD: usize = 4;
const OUT_PITCH_BEND: usize = 5;
const OUT_VOICE: usize = 6;

const CC_MOD_WHEEL: u8 = 1;
const CC_SUSTAIN: u8 = 64;
const CC_ALL_NOTES_OFF: u8 = 123;

/// Events queued per host sample before the queue starts dropping.
const EVENTS_PER_SAMPLE: usize = 1;
const MIN_EVENT_CAPACITY: usize = 256;

/// A control event. Timing travels alongside it in the queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteEvent {
    /// Note on. Velocity zero is treated as note off.
    NoteOn {
        /// MIDI note number.
        note: u8,
        /// 1..=127.
        velocity: u8,
    },
    /// Note off.
    NoteOff {
        /// MIDI note number.
        note: u8,
    },
    /// Continuous controller.
    Controller {
        /// Controller number.
        controller: u8,
        /// 0..=127.
        value: u8,
    },
    /// 14-bit pitch wheel, centre 8192.
    PitchWheel {
        /// 0..=16383.
        value: u16,
    },
    /// Polyphonic aftertouch.
    Aftertouch {
        /// MIDI note number.
        note: u8,
        /// 0..=127.
        value: u8,
    },
    /// Channel aftertouch, applied to every sounding voice.
    ChannelAftertouch {
        /// 0..=127.
        value: u8,
    },
    /// Sustain pedal.
    Sustain {
        /// Pedal down.
        on: bool,
    },
}

#[derive(Debug, Clone, Copy)]
struct TimedEvent {
    time: usize,
    seq: u32,
    event: NoteEvent,
}

#[derive(Debug, Clone, Copy, Default)]
struct Voice {
    note: Option<u8>,
    gate: f32,
    velocity: f32,
    pitch: f32,
    aftertouch: f32,
    age: u64,
    sustained: bool,
}

impl Voice {
    fn is_free(&self) -> bool {
        self.note.is_none() && !self.sustained
    }
}

/// The event-to-signal front end.
///
/// Events are queued with a sample offset relative to the start of the
/// current host callback. Before each vector step the engine calls
/// [`set_frame_offset`](Self::set_frame_offset) with the number of samples
/// already processed in this callback, and `process` applies each event at
/// `time - offset` within the vector. After the callback,
/// [`end_block`](Self::end_block) drops consumed events and rebases the rest.
///
/// Voices are allocated round robin over free voices; when none is free the
/// voice that has been sounding longest is stolen.
#[derive(Debug, Clone)]
pub struct EventsToSignals {
    voices: Vec<Voice>,
    queue: Vec<TimedEvent>,
    capacity: usize,
    next_seq: u32,
    cursor: usize,
    frame_offset: usize,
    next_voice: usize,
    clock: u64,
    sustain: bool,
    mod_wheel: f32,
    pitch_bend: f32,
    dropped: u64,
}

impl EventsToSignals {
    /// A front end allocating over `voices` voices.
    pub fn new(voices: usize) -> Self {
        let voices = voices.max(1);
        Self {
            voices: vec![Voice::default(); voices],
            queue: Vec::with_capacity(MIN_EVENT_CAPACITY),
            capacity: MIN_EVENT_CAPACITY,
            next_seq: 0,
            cursor: 0,
            frame_offset: 0,
            next_voice: 0,
            clock: 0,
            sustain: false,
            mod_wheel: 0.0,
            pitch_bend: 0.0,
            dropped: 0,
        }
    }

    /// Number of voices.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Host and vector sizes changed; resizes the event queue so pushes
    /// within a callback never reallocate.
    pub fn set_buffer_sizes(&mut self, host_buffer_size: usize, vector_size: usize) {
        let capacity = (host_buffer_size + vector_size) * EVENTS_PER_SAMPLE;
        self.capacity = capacity.max(MIN_EVENT_CAPACITY);
        if self.queue.capacity() < self.capacity {
            self.queue.reserve_exact(self.capacity - self.queue.len());
        }
    }

    /// Queues an event at `time` samples into the current host callback.
    /// Returns false if the queue is full and the event was dropped.
    pub fn push(&mut self, time: usize, event: NoteEvent) -> bool {
        if self.queue.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.queue.push(TimedEvent {
            time,
            seq: self.next_seq,
            event,
        });
        self.next_seq = self.next_seq.wrapping_add(1);
        true
    }

    /// Queues a note on.
    pub fn add_note_on(&mut self, note: u8, velocity: u8, time: usize) -> bool {
        self.push(time, NoteEvent::NoteOn { note, velocity })
    }

    /// Queues a note off.
    pub fn add_note_off(&mut self, note: u8, time: usize) -> bool {
        self.push(time, NoteEvent::NoteOff { note })
    }

    /// Queues a controller change.
    pub fn set_controller(&mut self, controller: u8, value: u8, time: usize) -> bool {
        self.push(time, NoteEvent::Controller { controller, value })
    }

    /// Queues a pitch wheel change.
    pub fn set_pitch_wheel(&mut self, value: u16, time: usize) -> bool {
        self.push(time, NoteEvent::PitchWheel { value })
    }

    /// Queues polyphonic aftertouch.
    pub fn set_aftertouch(&mut self, note: u8, value: u8, time: usize) -> bool {
        self.push(time, NoteEvent::Aftertouch { note, value })
    }

    /// Queues channel aftertouch.
    pub fn set_channel_aftertouch(&mut self, value: u8, time: usize) -> bool {
        self.push(time, NoteEvent::ChannelAftertouch { value })
    }

    /// Queues a sustain pedal change.
    pub fn set_sustain_pedal(&mut self, on: bool, time: usize) -> bool {
        self.push(time, NoteEvent::Sustain { on })
    }

    /// Drops queued events and releases every voice.
    pub fn clear_events(&mut self) {
        self.queue.clear();
        self.cursor = 0;
        self.sustain = false;
        for voice in &mut self.voices {
            *voice = Voice {
                pitch: voice.pitch,
                ..Voice::default()
            };
        }
    }

    /// Events dropped because the queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped
    }

    /// Events waiting to be applied.
    pub fn pending_events(&self) -> usize {
        self.queue.len() - self.cursor
    }

    /// Samples of the current host callback already processed. Sorts the
    /// queue by time so `process` can walk it in order.
    pub fn set_frame_offset(&mut self, offset: usize) {
        self.frame_offset = offset;
        let cursor = self.cursor;
        self.queue[cursor..].sort_unstable_by_key(|e| (e.time, e.seq));
    }

    /// The host callback is complete: drops applied events and rebases the
    /// rest onto the next callback.
    pub fn end_block(&mut self, processed: usize) {
        let applied = self.cursor;
        self.queue.drain(..applied);
        self.cursor = 0;
        for event in &mut self.queue {
            event.time = event.time.saturating_sub(processed);
        }
        self.frame_offset = 0;
    }

    /// Gate of voice `v`.
    pub fn gate(&self, v: usize) -> f32 {
        self.voices.get(v).map_or(0.0, |voice| voice.gate)
    }

    /// Note held by voice `v`.
    pub fn voice_note(&self, v: usize) -> Option<u8> {
        self.voices.get(v).and_then(|voice| voice.note)
    }

    fn apply(&mut self, event: NoteEvent) {
        match event {
            NoteEvent::NoteOn { note, velocity: 0 } => self.note_off(note),
            NoteEvent::NoteOn { note, velocity } => self.note_on(note, velocity),
            NoteEvent::NoteOff { note } => self.note_off(note),
            NoteEvent::Controller { controller, value } => match controller {
                CC_MOD_WHEEL => self.mod_wheel = f32::from(value) / 127.0,
                CC_SUSTAIN => self.set_sustain(value >= 64),
                CC_ALL_NOTES_OFF => {
                    self.sustain = false;
                    for voice in &mut self.voices {
                        voice.note = None;
                        voice.sustained = false;
                        voice.gate = 0.0;
                    }
                }
                _ => {}
            },
            NoteEvent::PitchWheel { value } => {
                self.pitch_bend = (f32::from(value.min(16383)) - 8192.0) / 8192.0;
            }
            NoteEvent::Aftertouch { note, value } => {
                for voice in self.voices.iter_mut().filter(|v| v.note == Some(note)) {
                    voice.aftertouch = f32::from(value) / 127.0;
                }
            }
            NoteEvent::ChannelAftertouch { value } => {
                for voice in self.voices.iter_mut().filter(|v| v.note.is_some()) {
                    voice.aftertouch = f32::from(value) / 127.0;
                }
            }
            NoteEvent::Sustain { on } => self.set_sustain(on),
        }
    }

    fn note_on(&mut self, note: u8, velocity: u8) {
        self.clock += 1;
        let v = self.allocate(note);
        self.next_voice = (v + 1) % self.voices.len();
        let voice = &mut self.voices[v];
        voice.note = Some(note);
        voice.gate = 1.0;
        voice.velocity = f32::from(velocity) / 127.0;
        voice.pitch = note_to_hz(note);
        voice.aftertouch = 0.0;
        voice.sustained = false;
        voice.age = self.clock;
    }

    fn allocate(&self, note: u8) -> usize {
        if let Some(v) = self.voices.iter().position(|v| v.note == Some(note)) {
            return v;
        }
        let n = self.voices.len();
        if let Some(v) = (0..n)
            .map(|i| (self.next_voice + i) % n)
            .find(|&v| self.voices[v].is_free())
        {
            return v;
        }
        self.voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| v.age)
            .map_or(0, |(i, _)| i)
    }

    fn note_off(&mut self, note: u8) {
        let sustain = self.sustain;
        for voice in self.voices.iter_mut().filter(|v| v.note == Some(note)) {
            voice.note = None;
            if sustain {
                voice.sustained = true;
            } else {
                voice.gate = 0.0;
            }
        }
    }

    fn set_sustain(&mut self, on: bool) {
        self.sustain = on;
        if !on {
            for voice in self.voices.iter_mut().filter(|v| v.sustained) {
                voice.sustained = false;
                voice.gate = 0.0;
            }
        }
    }

    fn write_frame(&self, outputs: &mut [SignalBuffer], i: usize) {
        for (v, voice) in self.voices.iter().enumerate() {
            let frame = [
                (OUT_PITCH, voice.pitch),
                (OUT_GATE, voice.gate),
                (OUT_VELOCITY, voice.velocity),
                (OUT_AFTERTOUCH, voice.aftertouch),
                (OUT_MOD, self.mod_wheel),
                (OUT_PITCH_BEND, self.pitch_bend),
                (OUT_VOICE, v as f32),
            ];
            for (port, value) in frame {
                if let Some(out) = outputs.get_mut(port)
                    && v < out.channels()
                {
                    out.row_mut(v)[i] = value;
                }
            }
        }
    }
}

fn note_to_hz(note: u8) -> f32 {
    440.0 * libm::powf(2.0, (f32::from(note) - 69.0) / 12.0)
}

impl Processor for EventsToSignals {
    fn output_channels(&self, _output: usize) -> usize {
        self.voices.len()
    }

    fn process(&mut self, _: &Inputs<'_>, outputs: &mut [SignalBuffer], ctx: &ProcessContext) {
        for i in 0..ctx.vector_size {
            let now = self.frame_offset + i;
            while let Some(timed) = self.queue.get(self.cursor).copied() {
                if timed.time > now {
                    break;
                }
                self.apply(timed.event);
                self.cursor += 1;
            }
            self.write_frame(outputs, i);
        }
    }

    fn reset(&mut self) {
        self.clear_events();
        self.mod_wheel = 0.0;
        self.pitch_bend = 0.0;
        for voice in &mut self.voices {
            *voice = Voice::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(voices: usize, width: usize) -> Vec<SignalBuffer> {
        (0..EVENT_OUTPUTS.len())
            .map(|_| SignalBuffer::new(width, voices))
            .collect()
    }

    fn ctx(width: usize) -> ProcessContext {
        ProcessContext {
            sample_rate: 48000.0,
            vector_size: width,
        }
    }

    #[test]
    fn note_on_is_sample_accurate() {
        let mut front = EventsToSignals::new(4);
        front.add_note_on(69, 127, 10);
        let mut outs = outputs(4, 16);
        front.set_frame_offset(0);
        front.process(&Inputs::unconnected(&[]), &mut outs, &ctx(16));
        let pitch = outs[OUT_PITCH].row(0);
        assert!(pitch[..10].iter().all(|&s| s == 0.0));
        assert!(pitch[10..].iter().all(|&s| (s - 440.0).abs() < 1e-3));
        assert_eq!(outs[OUT_GATE].row(0)[10], 1.0);
        assert_eq!(outs[OUT_GATE].row(1)[15], 0.0);
    }

    #[test]
    fn offsets_are_rebased_per_vector() {
        let mut front = EventsToSignals::new(2);
        front.add_note_on(60, 100, 20);
        let mut outs = outputs(2, 16);

        front.set_frame_offset(0);
        front.process(&Inputs::unconnected(&[]), &mut outs, &ctx(16));
        assert!(outs[OUT_GATE].row(0).iter().all(|&s| s == 0.0));

        front.set_frame_offset(16);
        front.process(&Inputs::unconnected(&[]), &mut outs, &ctx(16));
        let gate = outs[OUT_GATE].row(0);
        assert!(gate[..4].iter().all(|&s| s == 0.0));
        assert!(gate[4..].iter().all(|&s| s == 1.0));

        front.end_block(32);
        assert_eq!(front.pending_events(), 0);
    }

    #[test]
    fn future_events_survive_end_block() {
        let mut front = EventsToSignals::new(2);
        front.add_note_on(60, 100, 40);
        let mut outs = outputs(2, 16);
        front.set_frame_offset(0);
        front.process(&Inputs::unconnected(&[]), &mut outs, &ctx(16));
        front.end_block(16);
        assert_eq!(front.pending_events(), 1);

        front.set_frame_offset(0);
        front.process(&Inputs::unconnected(&[]), &mut outs, &ctx(16));
        front.set_frame_offset(16);
        front.process(&Inputs::unconnected(&[]), &mut outs, &ctx(16));
        // 40 - 16 = 24, so the gate opens at index 8 of the second vector
        let gate = outs[OUT_GATE].row(0);
        assert_eq!(gate[7], 0.0);
        assert_eq!(gate[8], 1.0);
    }

    #[test]
    fn round_robin_then_steal_oldest() {
        let mut front = EventsToSignals::new(2);
        for (t, note) in [60u8, 62, 64].into_iter().enumerate() {
            front.add_note_on(note, 100, t);
        }
        let mut outs = outputs(2, 8);
        front.set_frame_offset(0);
        front.process(&Inputs::unconnected(&[]), &mut outs, &ctx(8));
        // 60 went to voice 0, 62 to voice 1, 64 stole voice 0
        assert_eq!(front.voice_note(0), Some(64));
        assert_eq!(front.voice_note(1), Some(62));
    }

    #[test]
    fn sustain_holds_gate() {
        let mut front = EventsToSignals::new(1);
        front.add_note_on(60, 100, 0);
        front.set_sustain_pedal(true, 1);
        front.add_note_off(60, 2);
        let mut outs = outputs(1, 8);
        front.set_frame_offset(0);
        front.process(&Inputs::unconnected(&[]), &mut outs, &ctx(8));
        assert_eq!(front.gate(0), 1.0);
        front.end_block(8);

        front.set_sustain_pedal(false, 0);
        front.set_frame_offset(0);
        front.process(&Inputs::unconnected(&[]), &mut outs, &ctx(8));
        assert_eq!(front.gate(0), 0.0);
    }

    #[test]
    fn controllers_and_bend() {
        let mut front = EventsToSignals::new(2);
        front.set_controller(CC_MOD_WHEEL, 127, 0);
        front.set_pitch_wheel(16383, 0);
        let mut outs = outputs(2, 4);
        front.set_frame_offset(0);
        front.process(&Inputs::unconnected(&[]), &mut outs, &ctx(4));
        assert_eq!(outs[OUT_MOD].row(1)[0], 1.0);
        assert!(outs[OUT_PITCH_BEND].row(0)[0] > 0.99);
        assert_eq!(outs[OUT_VOICE].row(1)[3], 1.0);
    }

    #[test]
    fn full_queue_drops() {
        let mut front = EventsToSignals::new(1);
        for t in 0..MIN_EVENT_CAPACITY {
            assert!(front.set_channel_aftertouch(1, t));
        }
        assert!(!front.set_channel_aftertouch(1, 0));
        assert_eq!(front.dropped_events(), 1);
    }
}
