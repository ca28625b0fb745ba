//! Worker process side of the comparison protocol.

use super::{Comparator, WorkerReply, WorkerRequest, checked_similarity};
use crate::error::Result;
use std::io::{BufRead, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// Serve comparison requests until `input` reaches end of file.
///
/// Replies go to `output`, one line per request, flushed immediately. A
/// comparator panic is answered with [`WorkerReply::Panicked`] rather than
/// taking the worker down.
pub fn serve<C, R, W>(comparator: &mut C, input: R, mut output: W) -> Result<u64>
where
    C: Comparator,
    R: BufRead,
    W: Write,
{
    let mut served = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<WorkerRequest>(&line) {
            Ok(request) => {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    comparator.compare(&request.a, &request.b)
                }));
                match result {
                    Ok(Ok(similarity)) => match checked_similarity(similarity) {
                        Ok(similarity) => WorkerReply::Ok {
                            id: request.id,
                            similarity,
                        },
                        Err(e) => WorkerReply::Failed {
                            id: request.id,
                            message: e.to_string(),
                        },
                    },
                    Ok(Err(e)) => WorkerReply::Failed {
                        id: request.id,
                        message: e.to_string(),
                    },
                    Err(_) => WorkerReply::Panicked {
                        id: request.id,
                        message: "comparator panicked".to_string(),
                    },
                }
            }
            Err(e) => {
                warn!("Rejecting malformed request: {e}");
                WorkerReply::Rejected {
                    message: e.to_string(),
                }
            }
        };

        let encoded = serde_json::to_string(&reply)
            .map_err(|e| crate::error::Error::RecordSerialize { source: e })?;
        writeln!(output, "{encoded}")?;
        output.flush()?;
        served += 1;
    }

    debug!("Worker input closed after {served} request(s)");
    Ok(served)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compare::CompareError;
    use crate::model::FingerprintRecord;
    use std::io::Cursor;

    fn request(id: u64, fingerprint: &str) -> String {
        let rec = FingerprintRecord {
            entity_id: id.to_string(),
            variant_key: format!("{id}.mp3"),
            duration: 10.0,
            fingerprint: fingerprint.to_string(),
            source: "s".to_string(),
            format: "mp3".to_string(),
        };
        serde_json::to_string(&WorkerRequest {
            id,
            a: rec.clone(),
            b: rec,
        })
        .unwrap()
    }

    fn replies(output: &[u8]) -> Vec<WorkerReply> {
        String::from_utf8_lossy(output)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_serve_answers_each_request() {
        let mut comparator = |a: &FingerprintRecord, _: &FingerprintRecord| {
            if a.fingerprint == "bad" {
                Err(CompareError::Failed("nope".to_string()))
            } else {
                Ok(0.9)
            }
        };
        let input = format!("{}\n\n{}\nnot json\n", request(1, "ok"), request(2, "bad"));
        let mut output = Vec::new();

        let served = serve(&mut comparator, Cursor::new(input), &mut output).unwrap();
        assert_eq!(served, 3);

        let replies = replies(&output);
        assert_eq!(
            replies[0],
            WorkerReply::Ok {
                id: 1,
                similarity: 0.9
            }
        );
        assert!(matches!(replies[1], WorkerReply::Failed { id: 2, .. }));
        assert!(matches!(replies[2], WorkerReply::Rejected { .. }));
    }

    #[test]
    fn test_serve_contains_panics_and_bad_scores() {
        let mut comparator = |a: &FingerprintRecord, _: &FingerprintRecord| -> std::result::Result<f64, CompareError> {
            assert!(a.fingerprint != "panic", "native library crashed");
            Ok(1.5)
        };
        let input = format!("{}\n{}\n", request(1, "panic"), request(2, "x"));
        let mut output = Vec::new();

        serve(&mut comparator, Cursor::new(input), &mut output).unwrap();
        let replies = replies(&output);
        assert!(matches!(replies[0], WorkerReply::Panicked { id: 1, .. }));
        assert!(matches!(replies[1], WorkerReply::Failed { id: 2, .. }));
    }
}
