//! Diagnostic track dumps
use crate::{
    combination::Combination,
    errors::Error,
    prelude::{Epoch, TimeAxis},
    receiver::Receiver,
    track::Track,
};

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

#[cfg(feature = "flate2")]
use flate2::{write::GzEncoder, Compression};

/// [FileNameTemplate] resolves file names from variables,
/// written as `{name}` within the template.
/// ```
/// use gnss_preprocessing::prelude::FileNameTemplate;
///
/// let template = FileNameTemplate::new("bias/{station}.{prn}.txt");
/// let name = template.render(&[("station", "wtzr"), ("prn", "G01")]);
/// assert_eq!(name, "bias/wtzr.G01.txt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameTemplate {
    template: String,
}

impl FileNameTemplate {
    /// Creates a new [FileNameTemplate]
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Replaces all known variables. Unknown variables are left untouched.
    pub fn render(&self, variables: &[(&str, &str)]) -> String {
        let mut rendered = self.template.clone();
        for (name, value) in variables {
            rendered = rendered.replace(&format!("{{{}}}", name), value);
        }
        rendered
    }
}

/// Compact UTC date-time, like 20240101T000030
fn format_time(t: Epoch) -> String {
    let (y, m, d, hh, mm, ss, _) = t.to_gregorian_utc();
    format!("{:04}{:02}{:02}T{:02}{:02}{:02}", y, m, d, hh, mm, ss)
}

/// [TrackDumper] writes one text file per (track, [Combination]).
/// Supported template variables are `{station}`, `{prn}`,
/// `{timeStart}`, `{timeEnd}` and `{types}`.
/// Files ending with `.gz` are gzip compressed when the `flate2` feature is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDumper {
    template: FileNameTemplate,
}

impl TrackDumper {
    /// Creates a new [TrackDumper] from a file name template
    pub fn new(template: &str) -> Self {
        Self {
            template: FileNameTemplate::new(template),
        }
    }

    /// Resolves the file name of this track and [Combination]
    pub fn file_name(
        &self,
        station: &str,
        track: &Track,
        combination: Combination,
        axis: &TimeAxis,
    ) -> Option<PathBuf> {
        let t_start = axis.epoch(track.first_epoch()?)?;
        let t_end = axis.epoch(track.last_epoch()?)?;

        let prn = track.sv.to_string();
        let time_start = format_time(t_start);
        let time_end = format_time(t_end);
        let types = combination.to_string();

        Some(PathBuf::from(self.template.render(&[
            ("station", station),
            ("prn", &prn),
            ("timeStart", &time_start),
            ("timeEnd", &time_end),
            ("types", &types),
        ])))
    }

    /// Dumps one track and [Combination]
    pub fn dump(
        &self,
        station: &str,
        track: &Track,
        combination: Combination,
        axis: &TimeAxis,
    ) -> Result<Option<PathBuf>, Error> {
        let path = match self.file_name(station, track, combination, axis) {
            Some(path) => path,
            None => return Ok(None),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let fd = File::create(&path)?;

        #[cfg(feature = "flate2")]
        if path.extension().map(|ext| ext == "gz").unwrap_or(false) {
            let mut writer = BufWriter::new(GzEncoder::new(fd, Compression::default()));
            write_track(&mut writer, track, combination, axis)?;
            writer
                .into_inner()
                .map_err(|e| Error::Io(e.into_error()))?
                .finish()?;
            return Ok(Some(path));
        }

        let mut writer = BufWriter::new(fd);
        write_track(&mut writer, track, combination, axis)?;
        writer.flush()?;
        Ok(Some(path))
    }

    /// Dumps all tracks of this [Receiver], for both combinations.
    pub fn dump_receiver(&self, rx: &Receiver, axis: &TimeAxis) -> Result<Vec<PathBuf>, Error> {
        let mut paths = Vec::with_capacity(2 * rx.tracks_count());
        for track in rx.tracks.values().flatten() {
            for combination in [Combination::Tec, Combination::MelbourneWubbena] {
                if let Some(path) = self.dump(&rx.name, track, combination, axis)? {
                    paths.push(path);
                }
            }
        }
        Ok(paths)
    }
}

fn write_track<W: Write>(
    w: &mut W,
    track: &Track,
    combination: Combination,
    axis: &TimeAxis,
) -> std::io::Result<()> {
    writeln!(w, "# {} {} [cycles]", track.sv, combination)?;
    writeln!(w, "# index epoch value")?;
    for sample in track.samples() {
        let value = match combination {
            Combination::Tec => sample.tec,
            Combination::MelbourneWubbena => sample.mw,
        };
        match axis.epoch(sample.epoch) {
            Some(t) => writeln!(w, "{} {} {:.4}", sample.epoch, t, value)?,
            None => writeln!(w, "{} - {:.4}", sample.epoch, value)?,
        }
    }
    Ok(())
}
