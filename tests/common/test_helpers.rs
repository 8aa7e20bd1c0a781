use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const SIMPLE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root" type="xs:string"/>
</xs:schema>"#;

pub const VALID_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<root>Hello World</root>"#;

pub const INVALID_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<root><invalid>content</invalid></root>"#;

pub const MALFORMED_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<root><unclosed></root>"#;

/// Schema whose element type comes from `types.xsd` next to it
pub const INCLUDING_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:include schemaLocation="types.xsd"/>
    <xs:element name="root" type="RootType"/>
</xs:schema>"#;

pub const INCLUDED_TYPES_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:simpleType name="RootType">
        <xs:restriction base="xs:string"/>
    </xs:simpleType>
</xs:schema>"#;

/// Conforming once the internal entity is expanded
pub const INTERNAL_ENTITY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE root [<!ENTITY greet "Hello">]>
<root>&greet; World</root>"#;

/// References an external DTD subset and an external entity next to it
pub const EXTERNAL_REFS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE root SYSTEM "root.dtd" [
    <!ENTITY secret SYSTEM "secret.txt">
]>
<root>&secret;</root>"#;

pub const ROOT_DTD: &str = "<!ELEMENT root (#PCDATA)>\n";

/// Scratch directory with named files
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn missing(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
