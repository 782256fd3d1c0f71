/// Counters for one scrape run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Entities a scrape was attempted for.
    pub processed: u32,
    /// Entities whose override record was written.
    pub success: u32,
    /// Entities skipped: already captured, or nothing worth keeping.
    pub skipped: u32,
    /// Entities lost to a fetch or write failure.
    pub failed: u32,
    /// Successful entities that ended up without any image on disk.
    pub no_images: u32,
    /// Image files downloaded in this run.
    pub images: u32,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Scrape Run Complete ===")?;
        writeln!(f, "Processed:          {}", self.processed)?;
        writeln!(f, "Success:            {}", self.success)?;
        writeln!(f, "Skipped:            {}", self.skipped)?;
        writeln!(f, "Failed:             {}", self.failed)?;
        writeln!(f, "Without images:     {}", self.no_images)?;
        write!(f, "Images downloaded:  {}", self.images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_counter() {
        let stats = RunStats {
            processed: 3,
            success: 2,
            skipped: 1,
            failed: 0,
            no_images: 1,
            images: 7,
        };
        let rendered = stats.to_string();
        assert!(rendered.contains("Processed:          3"));
        assert!(rendered.contains("Images downloaded:  7"));
    }
}
