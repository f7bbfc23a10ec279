use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::config::Dimensions;
use crate::error::{Result, SlidecastError};

/// Sample rate every segment's audio track is normalized to
pub const AUDIO_SAMPLE_RATE: u32 = 44100;

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn copy_streams(self) -> Self {
        self.arg("-c").arg("copy")
    }

    pub fn filter_complex<S: Into<String>>(self, graph: S) -> Self {
        self.arg("-filter_complex").arg(graph)
    }

    pub fn map<S: Into<String>>(self, stream: S) -> Self {
        self.arg("-map").arg(stream)
    }

    /// Silent stereo source from the lavfi device
    pub fn silence_input(self, seconds: Option<f64>) -> Self {
        let cmd = self.arg("-f").arg("lavfi");
        let cmd = match seconds {
            Some(seconds) => cmd.arg("-t").arg(format!("{:.3}", seconds)),
            None => cmd,
        };
        cmd.input(format!("anullsrc=r={}:cl=stereo", AUDIO_SAMPLE_RATE))
    }

    /// H.264/AAC at a uniform sample layout, so segments can be stream-copied together
    pub fn delivery_encoding(self, fps: u32) -> Self {
        self.video_codec("libx264")
            .arg("-pix_fmt").arg("yuv420p")
            .arg("-r").arg(fps.to_string())
            .audio_codec("aac")
            .arg("-ar").arg(AUDIO_SAMPLE_RATE.to_string())
            .arg("-ac").arg("2")
    }

    fn process(&self) -> Command {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Run the command to completion, failing with its stderr on a non-zero exit.
    pub async fn execute(&self) -> Result<()> {
        self.capture().await.map(|_| ())
    }

    /// Run the command and return its standard output.
    pub async fn capture(&self) -> Result<String> {
        let output = self
            .process()
            .output()
            .await
            .map_err(|e| SlidecastError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SlidecastError::Media(format!(
                "{} failed: {}",
                self.description,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Builder for the encoder and probe invocations the pipeline needs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    binary_path: String,
    probe_path: String,
    extra_options: Vec<String>,
}

impl MediaCommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, probe_path: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            probe_path: probe_path.into(),
            extra_options: Vec::new(),
        }
    }

    /// Options appended to every encode, e.g. `-preset medium -crf 23`
    pub fn with_extra_options(mut self, options: Vec<String>) -> Self {
        self.extra_options = options;
        self
    }

    fn encode<S: Into<String>>(&self, description: S) -> MediaCommand {
        MediaCommand::new(&self.binary_path, description).overwrite()
    }

    fn finish<P: AsRef<Path>>(&self, cmd: MediaCommand, fps: u32, output_path: P) -> MediaCommand {
        cmd.delivery_encoding(fps)
            .args(self.extra_options.iter().cloned())
            .output(output_path)
    }

    /// Still image held for as long as `audio_path` plays.
    pub fn image_with_audio<P: AsRef<Path>>(
        &self,
        image_path: P,
        audio_path: P,
        output_path: P,
        dimensions: Dimensions,
        fps: u32,
    ) -> MediaCommand {
        let cmd = self
            .encode("Image segment")
            .arg("-loop").arg("1")
            .arg("-framerate").arg(fps.to_string())
            .input(image_path)
            .input(audio_path)
            .arg("-vf").arg(fit_filter(dimensions, fps))
            .arg("-tune").arg("stillimage")
            .arg("-shortest");
        self.finish(cmd, fps, output_path)
    }

    /// Still image held for a fixed time over silence.
    pub fn image_silent<P: AsRef<Path>>(
        &self,
        image_path: P,
        output_path: P,
        dimensions: Dimensions,
        fps: u32,
        seconds: f64,
    ) -> MediaCommand {
        let cmd = self
            .encode("Silent image segment")
            .arg("-loop").arg("1")
            .arg("-framerate").arg(fps.to_string())
            .input(image_path)
            .silence_input(None)
            .arg("-vf").arg(fit_filter(dimensions, fps))
            .arg("-tune").arg("stillimage")
            .arg("-t").arg(format!("{:.3}", seconds));
        self.finish(cmd, fps, output_path)
    }

    /// Video clip at its own length, narration padded with silence to match.
    pub fn clip_with_audio<P: AsRef<Path>>(
        &self,
        clip_path: P,
        audio_path: P,
        output_path: P,
        dimensions: Dimensions,
        fps: u32,
    ) -> MediaCommand {
        let cmd = self
            .encode("Clip segment")
            .input(clip_path)
            .input(audio_path)
            .filter_complex(format!("[0:v]{}[v];[1:a]apad[a]", fit_filter(dimensions, fps)))
            .map("[v]")
            .map("[a]")
            .arg("-shortest");
        self.finish(cmd, fps, output_path)
    }

    /// Video clip with its own audio replaced by silence.
    pub fn clip_silent<P: AsRef<Path>>(
        &self,
        clip_path: P,
        output_path: P,
        dimensions: Dimensions,
        fps: u32,
    ) -> MediaCommand {
        let cmd = self
            .encode("Silent clip segment")
            .input(clip_path)
            .silence_input(None)
            .filter_complex(format!("[0:v]{}[v]", fit_filter(dimensions, fps)))
            .map("[v]")
            .map("1:a")
            .arg("-shortest");
        self.finish(cmd, fps, output_path)
    }

    /// Join segments end to end without re-encoding.
    pub fn concatenate<P: AsRef<Path>>(&self, input_list_file: P, output_path: P) -> MediaCommand {
        self.encode("Concatenate segments")
            .arg("-f").arg("concat")
            .arg("-safe").arg("0")
            .input(input_list_file)
            .copy_streams()
            .output(output_path)
    }

    /// Join segments through a transition filter graph ending in `[vout]`/`[aout]`.
    pub fn blend<P: AsRef<Path>>(
        &self,
        segments: &[P],
        graph: &str,
        output_path: P,
        fps: u32,
    ) -> MediaCommand {
        let cmd = segments
            .iter()
            .fold(self.encode("Blend segments"), |cmd, segment| cmd.input(segment))
            .filter_complex(graph)
            .map("[vout]")
            .map("[aout]");
        self.finish(cmd, fps, output_path)
    }

    /// Container duration in seconds, printed as a bare number.
    pub fn probe_duration<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Duration probe")
            .arg("-v").arg("error")
            .arg("-show_entries").arg("format=duration")
            .arg("-of").arg("default=noprint_wrappers=1:nokey=1")
            .output(path)
    }

    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }

    pub fn probe_version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Probe version check").arg("-version")
    }
}

/// Scale into the frame keeping aspect ratio, pad the rest black.
pub fn fit_filter(dimensions: Dimensions, fps: u32) -> String {
    let Dimensions { width, height } = dimensions;
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}",
        w = width,
        h = height,
        fps = fps
    )
}

/// One `file '...'` line per segment for the concat demuxer.
pub fn concat_list<P: AsRef<Path>>(segments: &[P]) -> String {
    segments
        .iter()
        .map(|p| {
            let path = p.as_ref().to_string_lossy().replace('\'', "'\\''");
            format!("file '{}'\n", path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const HD: Dimensions = Dimensions { width: 1280, height: 720 };

    fn builder() -> MediaCommandBuilder {
        MediaCommandBuilder::new("ffmpeg", "ffprobe")
    }

    fn position(cmd: &MediaCommand, arg: &str) -> Option<usize> {
        cmd.args.iter().position(|a| a == arg)
    }

    #[test]
    fn test_image_segment_loops_until_audio_ends() {
        let cmd = builder().image_with_audio(
            Path::new("slide.png"),
            Path::new("slide.mp3"),
            Path::new("out.mp4"),
            HD,
            30,
        );
        assert_eq!(cmd.binary_path, "ffmpeg");
        assert_eq!(&cmd.args[..3], ["-y", "-loop", "1"]);
        assert!(cmd.args.contains(&"-shortest".to_string()));
        assert!(cmd.args.iter().any(|a| a.starts_with("scale=1280:720")));
        assert_eq!(cmd.args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_silent_image_has_fixed_length() {
        let cmd = builder().image_silent(Path::new("a.jpg"), Path::new("out.mp4"), HD, 25, 3.0);
        let t = position(&cmd, "-t").unwrap();
        assert_eq!(cmd.args[t + 1], "3.000");
        assert!(cmd.args.iter().any(|a| a.starts_with("anullsrc=r=44100")));
        assert!(!cmd.args.contains(&"-shortest".to_string()));
    }

    #[test]
    fn test_clip_pads_narration_to_clip_length() {
        let cmd = builder().clip_with_audio(
            Path::new("demo.mov"),
            Path::new("n.mp3"),
            Path::new("out.mp4"),
            HD,
            30,
        );
        let graph = position(&cmd, "-filter_complex").unwrap();
        assert!(cmd.args[graph + 1].ends_with("[1:a]apad[a]"));
    }

    #[test]
    fn test_concatenate_copies_streams() {
        let cmd = builder().concatenate(Path::new("list.txt"), Path::new("final.mp4"));
        assert_eq!(
            cmd.args,
            ["-y", "-f", "concat", "-safe", "0", "-i", "list.txt", "-c", "copy", "final.mp4"]
        );
    }

    #[test]
    fn test_blend_maps_filter_outputs() {
        let segments = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4"), PathBuf::from("out.mp4")];
        let cmd = builder().blend(&segments[..2], "[graph]", segments[2].clone(), 30);
        assert_eq!(cmd.args.iter().filter(|a| *a == "-i").count(), 2);
        let vout = position(&cmd, "[vout]").unwrap();
        assert_eq!(cmd.args[vout - 1], "-map");
        assert_eq!(cmd.args[vout + 2], "[aout]");
    }

    #[test]
    fn test_extra_options_precede_output() {
        let cmd = builder()
            .with_extra_options(vec!["-crf".into(), "23".into()])
            .image_silent(Path::new("a.png"), Path::new("o.mp4"), HD, 30, 1.0);
        let n = cmd.args.len();
        assert_eq!(&cmd.args[n - 3..], ["-crf", "23", "o.mp4"]);
    }

    #[test]
    fn test_probe_uses_probe_binary() {
        let cmd = builder().probe_duration(Path::new("seg.mp4"));
        assert_eq!(cmd.binary_path, "ffprobe");
        assert!(cmd.args.contains(&"format=duration".to_string()));
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[Path::new("/tmp/a.mp4"), Path::new("/tmp/it's.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }

    #[tokio::test]
    async fn test_missing_binary_is_media_error() {
        let cmd = MediaCommand::new("slidecast-no-such-binary", "Probe").arg("-version");
        assert!(matches!(cmd.execute().await, Err(SlidecastError::Media(_))));
    }
}
