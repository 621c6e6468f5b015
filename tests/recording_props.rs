//! Property tests for chunk assembly and the raw container

use bytes::Bytes;
use crabrec::encoding::{MediaEncoder, RawEncoder, RawReader, StreamLayout, RAW_MIME_TYPE};
use crabrec::recording::ChunkBuffer;
use crabrec::types::{AudioFrame, SourceKind, TrackInfo, TrackKind};
use proptest::prelude::*;

proptest! {
    #[test]
    fn concat_is_ordered_join_of_chunks(chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..32)) {
        let mut buffer = ChunkBuffer::new();
        for chunk in &chunks {
            buffer.push(Bytes::from(chunk.clone()));
        }

        let expected: Vec<u8> = chunks.iter().flatten().copied().collect();
        prop_assert_eq!(buffer.byte_len(), expected.len());
        prop_assert_eq!(buffer.len(), chunks.iter().filter(|c| !c.is_empty()).count());

        let joined = buffer.concat();
        prop_assert_eq!(joined.len(), expected.len());
        prop_assert_eq!(&joined[..], &expected[..]);
        prop_assert!(buffer.is_empty());
    }

    #[test]
    fn reader_never_panics_on_arbitrary_input(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = RawReader::parse(&data);
    }

    #[test]
    fn reader_counts_every_audio_record(frames in proptest::collection::vec(1usize..64, 1..20), split in 0usize..20) {
        let layout = StreamLayout {
            video: None,
            audio: Some(TrackInfo::audio(Some(SourceKind::Microphone), "mic", 48000, 2)),
        };
        let mut encoder: Box<dyn MediaEncoder> = Box::new(RawEncoder::new(RAW_MIME_TYPE, &layout).unwrap());
        let mut buffer = ChunkBuffer::new();

        for (i, n) in frames.iter().enumerate() {
            encoder.encode_audio(&AudioFrame {
                samples: vec![0.1; n * 2],
                sample_rate: 48000,
                channels: 2,
                timestamp: i as f64 * 0.01,
            }).unwrap();
            if i == split {
                buffer.push(Bytes::from(encoder.take_output()));
            }
        }
        buffer.push(Bytes::from(encoder.finish().unwrap()));

        let parsed = RawReader::parse(&buffer.concat()).unwrap();
        prop_assert_eq!(parsed.sample_count(TrackKind::Audio), frames.len());
        let samples: usize = frames.iter().map(|n| n * 2).sum();
        prop_assert_eq!(parsed.payload_bytes(), (samples * 4) as u64);
    }
}
