//! Human-readable renderings of readings and records.

use crate::data::record::POWER_CHANNELS;
use crate::data::SampleRecord;
use crate::hardware::GroupReading;
use crate::sampling::Readings;

/// `[22.00C, 22.10C]` style list.
pub fn format_values(values: &[f32], precision: usize, unit: &str) -> String {
    let items: Vec<String> = values
        .iter()
        .map(|v| format!("{:.*}{}", precision, v, unit))
        .collect();
    format!("[{}]", items.join(", "))
}

fn format_group(reading: &GroupReading, precision: usize, unit: &str) -> String {
    if reading.present {
        format_values(&reading.values, precision, unit)
    } else {
        "ABSENT".to_string()
    }
}

fn power_block(reading: &GroupReading, block: usize) -> GroupReading {
    let start = block * POWER_CHANNELS;
    let values = reading
        .values
        .get(start..start + POWER_CHANNELS)
        .map(<[f32]>::to_vec)
        .unwrap_or_default();
    GroupReading {
        values,
        present: reading.present,
    }
}

/// Science sensors block.
pub fn format_science(readings: &Readings) -> String {
    let mut out = format!("Timestamp:\t{} ms\n", readings.timestamp_ms);
    out.push_str(&format!(
        "Temperatures:\t{}\n",
        format_group(&readings.thermocouples, 2, "C")
    ));
    out.push_str(&format!(
        "Pressures:\t{}\n",
        format_group(&readings.pressures, 3, "kPa")
    ));
    out
}

/// Housekeeping block.
pub fn format_housekeeping(readings: &Readings) -> String {
    let power = &readings.power_monitors;
    let blocks = [
        ("HK Voltages", 0, 3, "V"),
        ("HK Currents", 1, 3, "A"),
        ("HK Powers", 2, 3, "W"),
    ];

    let mut out = format!("Timestamp:\t{} ms\n", readings.timestamp_ms);
    for (label, block, precision, unit) in blocks {
        let values = format_group(&power_block(power, block), precision, unit);
        out.push_str(&format!("{}:\t{}\n", label, values));
    }
    out.push_str(&format!(
        "HK Temps:\t{}\n",
        format_group(&readings.board_temperatures, 1, "C")
    ));
    out.push_str(&format!(
        "HK Die Temps:\t{}\n",
        format_group(&power_block(power, 3), 1, "C")
    ));
    out
}

/// One buffered record, as printed by `dump`.
pub fn format_record(index: usize, record: &SampleRecord) -> String {
    let fields: [(&str, &[f32], usize, &str); 7] = [
        ("Temperatures", &record.temperatures[..], 2, "C"),
        ("Pressures", &record.pressures[..], 3, "kPa"),
        ("HK Temps", &record.board_temperatures[..], 1, "C"),
        ("HK Voltages", &record.voltages[..], 3, "V"),
        ("HK Currents", &record.currents[..], 3, "A"),
        ("HK Powers", &record.powers[..], 3, "W"),
        ("HK Die Temps", &record.die_temperatures[..], 1, "C"),
    ];

    let mut out = format!("Sample #{} | Timestamp: {} ms\n", index, record.timestamp_ms);
    for (label, values, precision, unit) in fields {
        out.push_str(&format!("{}:\t{}\n", label, format_values(values, precision, unit)));
    }
    out
}

/// `1d 02:03:04` style uptime.
pub fn format_uptime(elapsed: std::time::Duration) -> String {
    let secs = elapsed.as_secs();
    let (days, rem) = (secs / 86_400, secs % 86_400);
    let (hours, rem) = (rem / 3600, rem % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    if days > 0 {
        format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}
