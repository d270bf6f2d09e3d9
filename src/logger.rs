use std::{
    collections::HashMap,
    fmt::Write as _,
    fs::OpenOptions,
    path::PathBuf,
};
use nu_ansi_term::{Color, Style};
use serde::Deserialize;
use termcolor::ColorChoice;
use tracing::{field::{Field, Visit}, Level};
use tracing_log::NormalizeEvent;
use tracing_subscriber::{
    filter::{FilterFn, LevelFilter},
    fmt::FormatEvent,
    prelude::*,
};

use crate::{prelude::*, args::Args};


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Specifies what log messages to emit, based on the module path and log level.
    ///
    /// This is a map where the key specifies a module path prefix, and the
    /// value specifies a minimum log level. For each log message, the map
    /// entry with the longest prefix matching the log's module path is chosen.
    /// If no such entry exists, the log is not emitted. Otherwise, that
    /// entry's level is used to check whether the log message should be
    /// emitted.
    ///
    /// Example: allow ≥"info" logs from Emporium generally, ≥"trace" from the
    /// `db` module, but nothing from the per-query logs in `db::tx`:
    ///
    ///    [log]
    ///    filters.emporium = "info"
    ///    filters."emporium::db" = "trace"
    ///    filters."emporium::db::tx" = "off"
    ///    filters.hyper = "debug"
    #[config(default = { "emporium": "debug" })]
    pub(crate) filters: Filters,

    /// If this is set, log messages are also written to this file. The string
    /// `${cmd}` in this value is replaced by the subcommand name of the
    /// process, e.g. `serve` or `other`. Example:
    /// "/var/log/emporium-${cmd}.log".
    pub(crate) file: Option<PathBuf>,

    /// If this is set to `false`, log messages are not written to stdout.
    #[config(default = true)]
    pub(crate) stdout: bool,

    /// If set to `true`, HTTP header of each incoming request are logged
    /// (with 'trace' level).
    #[config(default = false)]
    pub(crate) log_http_headers: bool,
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(HashMap<String, LevelFilter>);

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;
    fn try_from(value: HashMap<String, String>) -> Result<Self, Self::Error> {
        value.into_iter()
            .map(|(target_prefix, level)| Ok((target_prefix, parse_level_filter(&level)?)))
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

impl Filters {
    /// Returns the level of the entry with the longest prefix of `target`.
    fn level_for(&self, target: &str) -> Option<LevelFilter> {
        self.0.iter()
            .filter(|(prefix, _)| target.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, level)| *level)
    }
}

fn parse_level_filter(s: &str) -> Result<LevelFilter, String> {
    match s {
        "off" => Ok(LevelFilter::OFF),
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        other => Err(format!("invalid log level '{other}'")),
    }
}

/// Installs our own logger globally. Must only be called once!
pub(crate) fn init(config: &LogConfig, args: &Args, cmd: &str) -> Result<()> {
    let filter = {
        let filters = Filters(config.filters.0.clone());
        let max_level = filters.0.values().max().copied().unwrap_or(LevelFilter::OFF);
        FilterFn::new(move |metadata| {
            filters.level_for(metadata.target())
                .is_some_and(|level| metadata.level() <= &level)
        }).with_max_level_hint(max_level)
    };

    macro_rules! subscriber {
        ($writer:expr) => {
            tracing_subscriber::fmt::layer()
                .event_format(EventFormatter(args.color))
                .with_writer($writer)
        };
    }

    let stdout_output = config.stdout.then(|| subscriber!(std::io::stdout));

    let file_output = config.file.as_ref()
        .map(|path| -> Result<std::fs::File> {
            use std::io::Write;

            let new_path = path.to_str()
                .ok_or_else(|| anyhow!("log file path is not valid UTF-8"))?
                .replace("${cmd}", cmd);

            let mut file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(new_path)
                .with_context(|| format!("failed to open/create log file '{}'", path.display()))?;

            // Empty line to make process restarts easy to spot.
            file.write_all(b"\n").context("could not write to log file")?;

            Ok(file)
        })
        .transpose()?
        .map(|file| subscriber!(file).with_ansi(args.color == ColorChoice::Always));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_output)
        .with(stdout_output)
        .init();

    Ok(())
}

type TracingWriter<'a> = tracing_subscriber::fmt::format::Writer<'a>;

/// Formats events as `<time> <level> <target> >  <message> ~~ <fields>`,
/// indenting continuation lines of multi-line messages below the message.
#[derive(Clone, Copy)]
struct EventFormatter(ColorChoice);

impl<S, N> FormatEvent<S, N> for EventFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: TracingWriter<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let use_ansi = self.0 == ColorChoice::Always
            || (writer.has_ansi_escapes() && self.0 != ColorChoice::Never);

        // Events forwarded from the `log` crate carry their real target in fields.
        let normalized_metadata = event.normalized_metadata();
        let metadata = normalized_metadata.as_ref().unwrap_or(event.metadata());

        let dim_style = Style::new().dimmed();
        let (level_style, body_style) = match *metadata.level() {
            Level::ERROR => (Style::new().fg(Color::Red).bold(), Style::new().fg(Color::Red)),
            Level::WARN => (Style::new().fg(Color::Yellow).bold(), Style::new().fg(Color::Yellow)),
            Level::INFO => (Style::new().fg(Color::Green), Style::new()),
            Level::DEBUG => (Style::new().fg(Color::Blue), Style::new().dimmed()),
            Level::TRACE => (Style::new().fg(Color::Magenta), Style::new().fg(Color::DarkGray)),
        };

        let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%3f");
        with_style(&mut writer, use_ansi, dim_style, |w| write!(w, "{time} "))?;
        with_style(&mut writer, use_ansi, level_style, |w| write!(w, "{:5}", metadata.level()))?;
        with_style(&mut writer, use_ansi, dim_style, |w| write!(w, " {} >  ", metadata.target()))?;

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        // Continuation lines are aligned with the start of the message.
        let padding = "2021-05-04 19:40:18.270 DEBUG ".len() + 1 + metadata.target().len();
        let mut lines = fields.message.lines();
        let first = lines.next().unwrap_or("");
        with_style(&mut writer, use_ansi, body_style, |w| write!(w, "{first}"))?;
        for line in lines {
            write!(writer, "\n{:padding$}", "")?;
            with_style(&mut writer, use_ansi, dim_style, |w| write!(w, ">  "))?;
            with_style(&mut writer, use_ansi, body_style, |w| write!(w, "{line}"))?;
        }

        if !fields.others.is_empty() {
            if !fields.message.is_empty() {
                with_style(&mut writer, use_ansi, level_style, |w| write!(w, " ~~ "))?;
            }
            for (i, (name, value)) in fields.others.iter().enumerate() {
                if i > 0 {
                    write!(writer, " ")?;
                }
                with_style(&mut writer, use_ansi, body_style.italic(), |w| write!(w, "{name}"))?;
                with_style(&mut writer, use_ansi, body_style, |w| write!(w, "={value}"))?;
            }
        }

        writeln!(writer, "{}", if use_ansi { nu_ansi_term::ansi::RESET } else { "" })
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    others: Vec<(&'static str, String)>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let name = field.name();
        if name == "message" {
            let _ = write!(self.message, "{value:?}");
        } else if !name.starts_with("log.") {
            self.others.push((name, format!("{value:?}")));
        }
    }
}

fn with_style(
    out: &mut TracingWriter<'_>,
    use_ansi: bool,
    style: Style,
    f: impl FnOnce(&mut TracingWriter<'_>) -> std::fmt::Result,
) -> std::fmt::Result {
    if use_ansi {
        write!(out, "{}", style.prefix())?;
    }
    f(out)?;
    if use_ansi {
        write!(out, "{}", style.suffix())?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use tracing_subscriber::filter::LevelFilter;
    use super::Filters;

    fn filters(entries: &[(&str, &str)]) -> Filters {
        let map = entries.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Filters::try_from(map).unwrap()
    }

    #[test]
    fn longest_prefix_wins() {
        let f = filters(&[
            ("emporium", "info"),
            ("emporium::db", "trace"),
            ("emporium::db::tx", "off"),
        ]);
        assert_eq!(f.level_for("emporium::api"), Some(LevelFilter::INFO));
        assert_eq!(f.level_for("emporium::db::migrations"), Some(LevelFilter::TRACE));
        assert_eq!(f.level_for("emporium::db::tx"), Some(LevelFilter::OFF));
        assert_eq!(f.level_for("hyper"), None);
    }

    #[test]
    fn invalid_level() {
        let map = HashMap::from([("emporium".to_owned(), "loud".to_owned())]);
        assert!(Filters::try_from(map).is_err());
    }
}
