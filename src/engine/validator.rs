use kdump_api::{
    config::{MemoryBounds, ReservedMemory},
    error::{InvalidInputError, KdumpError},
};

/// Parse a user supplied reservation and check it against `bounds`.
///
/// `auto` is always accepted. Manual values outside the bounds are rejected,
/// not clamped.
pub fn normalize(input: &str, bounds: &MemoryBounds) -> Result<ReservedMemory, KdumpError> {
    let invalid = |reason: String| {
        KdumpError::new(InvalidInputError::InvalidReservation {
            value: input.to_owned(),
            reason,
        })
    };

    let reserved = input
        .parse::<ReservedMemory>()
        .map_err(|e| invalid(e.to_string()))?;

    if let ReservedMemory::Megabytes(mb) = reserved {
        if !bounds.contains(mb) {
            return Err(invalid(format!("must be within {bounds}")));
        }

        if (mb - bounds.lower) % bounds.step != 0 {
            return Err(invalid(format!(
                "must be {} MB plus a multiple of {} MB",
                bounds.lower, bounds.step
            )));
        }
    }

    Ok(reserved)
}

#[cfg(test)]
mod tests {
    use super::*;

    use kdump_api::error::ErrorKind;

    const BOUNDS: MemoryBounds = MemoryBounds {
        lower: 160,
        upper: 3584,
        step: 1,
    };

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("auto", &BOUNDS).unwrap(), ReservedMemory::Auto);
        assert_eq!(
            normalize("256", &BOUNDS).unwrap(),
            ReservedMemory::Megabytes(256)
        );
        assert_eq!(normalize("256M", &BOUNDS).unwrap().to_string(), "256M");
        assert_eq!(normalize("160", &BOUNDS).unwrap().to_string(), "160M");
        assert_eq!(normalize("3584M", &BOUNDS).unwrap().to_string(), "3584M");
    }

    #[test]
    fn test_normalize_round_trip() {
        for input in ["auto", "160", "512M", "'1024'", "3584"] {
            let once = normalize(input, &BOUNDS).unwrap();
            let twice = normalize(&once.to_string(), &BOUNDS).unwrap();
            assert_eq!(once, twice, "{input}");
        }
    }

    #[test]
    fn test_normalize_rejects() {
        for input in ["", "lots", "1G", "-1", "159", "3585M", "0"] {
            let error = normalize(input, &BOUNDS).unwrap_err();
            match error.kind() {
                ErrorKind::InvalidInput(InvalidInputError::InvalidReservation { value, .. }) => {
                    assert_eq!(value, input)
                }
                kind => panic!("Unexpected error for '{input}': {kind:?}"),
            }
        }
    }

    #[test]
    fn test_normalize_step() {
        let bounds = MemoryBounds {
            lower: 128,
            upper: 1024,
            step: 64,
        };
        normalize("192", &bounds).unwrap();
        let error = normalize("200", &bounds).unwrap_err();
        assert_eq!(
            error.kind().to_string(),
            "Invalid memory reservation '200': must be 128 MB plus a multiple of 64 MB"
        );
    }
}
