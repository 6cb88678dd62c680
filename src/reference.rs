use std::{collections::HashMap, io::BufRead, rc::Rc};

/// Upper case letters are kept as is, anything that is not a letter becomes N
fn clean_base(c: u8) -> u8 {
    if c.is_ascii_alphabetic() {
        c.to_ascii_uppercase()
    } else {
        b'N'
    }
}

pub struct Contig {
    tid: usize,
    seq: Vec<u8>,
    name: Rc<str>,
}

impl Contig {
    pub fn tid(&self) -> usize {
        self.tid
    }

    pub fn size(&self) -> usize {
        self.seq.len()
    }

    pub fn seq(&self) -> &[u8] {
        &self.seq
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference base at `pos` (0 offset); N if past the end of the contig
    pub fn base(&self, pos: usize) -> u8 {
        self.seq.get(pos).copied().unwrap_or(b'N')
    }
}

struct FastaReader<R: BufRead> {
    rdr: R,
    buffer: String,
    line: usize,
}

impl<R: BufRead> FastaReader<R> {
    fn new(rdr: R) -> FastaReader<R> {
        let buffer = String::new();
        Self {
            rdr,
            buffer,
            line: 0,
        }
    }

    /// Read the next contig known to `name2tid`, skipping any others
    fn next_record<F>(&mut self, name2tid: &F) -> anyhow::Result<Option<Contig>>
    where
        F: Fn(&str) -> Option<usize>,
    {
        if self.buffer.is_empty() {
            if self.rdr.read_line(&mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line += 1;
        }
        loop {
            let name: Rc<str> = self
                .buffer
                .strip_prefix('>')
                .and_then(|s| s.split_ascii_whitespace().next())
                .map(Rc::from)
                .ok_or_else(|| anyhow!("Expected '>' at start of line {}", self.line))?;
            let ctg = name2tid(&*name);
            trace!("Found contig {} (tid = {:?})", name, ctg);
            let mut seq = Vec::new();
            loop {
                self.buffer.clear();
                if self.rdr.read_line(&mut self.buffer)? == 0 {
                    break;
                }
                self.line += 1;
                if self.buffer.starts_with('>') {
                    break;
                }
                if ctg.is_some() {
                    seq.extend(self.buffer.trim_end().bytes().map(clean_base))
                }
            }
            if let Some(tid) = ctg {
                return Ok(Some(Contig { name, tid, seq }));
            } else if self.buffer.is_empty() {
                return Ok(None);
            }
        }
    }
}

#[derive(Default)]
pub struct Reference {
    contigs: HashMap<usize, Contig>,
    name2tid: HashMap<Rc<str>, usize>,
}

impl Reference {
    /// Read reference sequences from a FASTA stream.  Only contigs for which `name2tid` returns
    /// a target id are stored.
    pub fn from_reader<R, F>(rdr: R, name2tid: F) -> anyhow::Result<Self>
    where
        R: BufRead,
        F: Fn(&str) -> Option<usize>,
    {
        let mut contigs = HashMap::new();
        let mut name2tid_map = HashMap::new();
        let mut fasta_rdr = FastaReader::new(rdr);
        while let Some(ctg) = fasta_rdr.next_record(&name2tid)? {
            debug!("Read in contig {} ({} bp)", ctg.name, ctg.size());
            name2tid_map.insert(ctg.name.clone(), ctg.tid);
            contigs.insert(ctg.tid, ctg);
        }
        Ok(Reference {
            contigs,
            name2tid: name2tid_map,
        })
    }

    pub fn n_contigs(&self) -> usize {
        self.contigs.len()
    }

    pub fn contig(&self, tid: usize) -> Option<&Contig> {
        self.contigs.get(&tid)
    }

    pub fn name2contig(&self, s: &str) -> Option<&Contig> {
        self.name2tid.get(s).and_then(|x| self.contigs.get(x))
    }

    pub fn contigs(&self) -> &HashMap<usize, Contig> {
        &self.contigs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FASTA: &str = ">chr1 first\nACGTacgt\nNNRY\n>chrUn\nAAAA\n>chr2\nGG-C\n";

    fn tids(s: &str) -> Option<usize> {
        match s {
            "chr1" => Some(0),
            "chr2" => Some(1),
            _ => None,
        }
    }

    #[test]
    fn read_fasta() {
        let r = Reference::from_reader(FASTA.as_bytes(), tids).unwrap();
        assert_eq!(r.n_contigs(), 2);
        let c = r.name2contig("chr1").unwrap();
        assert_eq!(c.tid(), 0);
        assert_eq!(c.seq(), b"ACGTACGTNNRY");
        assert_eq!(c.base(10), b'R');
        assert_eq!(c.base(100), b'N');
        assert!(r.name2contig("chrUn").is_none());
        assert_eq!(r.contig(1).unwrap().seq(), b"GGNC");
    }

    #[test]
    fn missing_header() {
        assert!(Reference::from_reader("ACGT\n".as_bytes(), tids).is_err());
    }
}
