//! GPS sentence parsing.
//!
//! Supports two text formats commonly broadcast over UDP by GPS bridges:
//! - **XGPS/XGPS2** (ForeFlight) - `XGPS<source>,lon,lat,alt_m,track,gs_m/s`
//! - **NMEA 0183 RMC** - `$GPRMC,time,status,lat,N|S,lon,E|W,speed_kn,course,date,...*hh`
//!
//! A datagram may carry several newline-separated sentences; the last valid
//! position wins.

use tracing::trace;

use crate::reporting::LocationFix;

/// Conversion factor: knots to meters per second.
const KNOTS_TO_MS: f32 = 0.514_444;

/// Parse a datagram into a fix, if it contains a usable position.
pub fn parse_datagram(data: &[u8]) -> Option<LocationFix> {
    let text = std::str::from_utf8(data).ok()?;
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(parse_sentence)
        .last()
}

/// Parse one sentence (auto-detects format).
pub fn parse_sentence(line: &str) -> Option<LocationFix> {
    if line.starts_with("XGPS") {
        return parse_xgps(line);
    }
    if line.starts_with('$') && line.get(3..6) == Some("RMC") {
        return parse_rmc(line);
    }
    None
}

fn parse_xgps(line: &str) -> Option<LocationFix> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 6 {
        trace!("XGPS sentence too short: {} parts", parts.len());
        return None;
    }

    let longitude: f64 = parts[1].trim().parse().ok()?;
    let latitude: f64 = parts[2].trim().parse().ok()?;
    let speed: f32 = parts[5].trim().parse().ok()?;

    valid_position(latitude, longitude)?;
    Some(LocationFix::new(latitude, longitude).with_speed(speed.max(0.0)))
}

fn parse_rmc(line: &str) -> Option<LocationFix> {
    let body = verify_checksum(line)?;
    let parts: Vec<&str> = body.split(',').collect();
    if parts.len() < 8 {
        trace!("RMC sentence too short: {} parts", parts.len());
        return None;
    }

    // 'V' means the receiver has no valid fix.
    if parts[2] != "A" {
        return None;
    }

    let latitude = parse_coordinate(parts[3], parts[4], 2)?;
    let longitude = parse_coordinate(parts[5], parts[6], 3)?;
    valid_position(latitude, longitude)?;

    let mut fix = LocationFix::new(latitude, longitude);
    if let Ok(knots) = parts[7].parse::<f32>() {
        fix = fix.with_speed(knots * KNOTS_TO_MS);
    }
    Some(fix)
}

/// Strip the leading `$` and trailing `*hh`, checking the XOR checksum when
/// one is present.
fn verify_checksum(line: &str) -> Option<&str> {
    let line = line.strip_prefix('$')?;
    let Some((body, checksum)) = line.split_once('*') else {
        return Some(line);
    };

    let expected = u8::from_str_radix(checksum.get(..2)?, 16).ok()?;
    let actual = body.bytes().fold(0u8, |acc, b| acc ^ b);
    if actual != expected {
        trace!(expected, actual, "NMEA checksum mismatch");
        return None;
    }
    Some(body)
}

/// Convert NMEA `(d)ddmm.mmmm` plus hemisphere to signed decimal degrees.
fn parse_coordinate(value: &str, hemisphere: &str, degree_digits: usize) -> Option<f64> {
    if value.len() <= degree_digits {
        return None;
    }
    let degrees: f64 = value.get(..degree_digits)?.parse().ok()?;
    let minutes: f64 = value.get(degree_digits..)?.parse().ok()?;
    if minutes >= 60.0 {
        return None;
    }

    let magnitude = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Some(magnitude),
        "S" | "W" => Some(-magnitude),
        _ => None,
    }
}

fn valid_position(latitude: f64, longitude: f64) -> Option<()> {
    ((-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)).then_some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_checksum(body: &str) -> String {
        let sum = body.bytes().fold(0u8, |acc, b| acc ^ b);
        format!("${}*{:02X}", body, sum)
    }

    #[test]
    fn xgps_sentence() {
        let fix = parse_sentence("XGPSPhoneBridge,-122.5,45.5,30.0,270.5,1.4").unwrap();

        assert!((fix.latitude - 45.5).abs() < 1e-9);
        assert!((fix.longitude - (-122.5)).abs() < 1e-9);
        assert_eq!(fix.speed, Some(1.4));
        assert!(fix.accuracy.is_none());
    }

    #[test]
    fn xgps2_sentence() {
        assert!(parse_sentence("XGPS2Bridge,10.0,53.5,12.0,90.0,0.0").is_some());
    }

    #[test]
    fn xgps_too_short() {
        assert!(parse_sentence("XGPSBridge,-122.5,45.5,30.0,270.5").is_none());
    }

    #[test]
    fn xgps_out_of_range() {
        assert!(parse_sentence("XGPSBridge,200.0,45.5,30.0,270.5,0.0").is_none());
    }

    #[test]
    fn rmc_sentence() {
        let line = with_checksum("GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
        let fix = parse_sentence(&line).unwrap();

        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((fix.longitude - 11.516_666).abs() < 1e-4);
        assert!((fix.speed.unwrap() - 11.52).abs() < 0.01);
    }

    #[test]
    fn rmc_southern_western_hemispheres() {
        let line = with_checksum("GNRMC,101010,A,3351.000,S,15112.000,W,0.0,0.0,010126,,");
        let fix = parse_sentence(&line).unwrap();

        assert!(fix.latitude < 0.0);
        assert!(fix.longitude < 0.0);
        assert!((fix.latitude - (-33.85)).abs() < 1e-6);
    }

    #[test]
    fn rmc_without_fix_is_ignored() {
        let line = with_checksum("GPRMC,123519,V,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
        assert!(parse_sentence(&line).is_none());
    }

    #[test]
    fn rmc_bad_checksum_is_rejected() {
        let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*00";
        assert!(parse_sentence(line).is_none());
    }

    #[test]
    fn rmc_without_checksum_is_accepted() {
        let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,,084.4,230394,003.1,W";
        let fix = parse_sentence(line).unwrap();
        assert!(fix.speed.is_none());
    }

    #[test]
    fn unknown_sentences_are_ignored() {
        assert!(parse_sentence("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M").is_none());
        assert!(parse_sentence("XATTBridge,45.5,5.2,-3.1").is_none());
        assert!(parse_datagram(b"\xff\xfe").is_none());
    }

    #[test]
    fn datagram_takes_last_valid_sentence() {
        let rmc = with_checksum("GPRMC,123519,A,4807.038,N,01131.000,E,0.0,0.0,230394,,");
        let datagram = format!("XGPSBridge,1.0,2.0,0,0,0\r\n{}\r\n$GPGSV,garbage\r\n", rmc);

        let fix = parse_datagram(datagram.as_bytes()).unwrap();
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
    }
}
