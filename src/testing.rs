//! Fixtures shared by unit tests.

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;

pub const SAMPLE_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Sample</dc:title>
    <meta name="cover" content="cover"/>
  </metadata>
  <manifest>
    <item id="a" href="Text/a.xhtml" media-type="application/xhtml+xml"/>
    <item id="nav" href="Text/nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="cross" href="Text/Generic%20Cross%20Sales.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="Styles/style.css" media-type="text/css"/>
    <item id="unused-css" href="Styles/unused.css" media-type="text/css"/>
    <item id="font1" href="Fonts/font1.woff" media-type="font/woff"/>
    <item id="font2" href="Fonts/font2.woff" media-type="font/woff"/>
    <item id="img1" href="Images/img1.png" media-type="image/png"/>
    <item id="img2" href="Images/img2.png" media-type="image/png"/>
    <item id="img3" href="Images/img3.png" media-type="image/png"/>
    <item id="promo" href="Images/promo.png" media-type="image/png"/>
    <item id="logo" href="Images/logo.png" media-type="image/png"/>
    <item id="cover" href="Images/cover.jpg" media-type="image/jpeg"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="a"/>
    <itemref idref="cross"/>
  </spine>
  <guide>
    <reference type="text" title="Start" href="Text/a.xhtml"/>
  </guide>
</package>
"#;

const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const CHAPTER_A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><link rel="stylesheet" type="text/css" href="../Styles/style.css"/></head>
<body><p>Hello</p><img src="../Images/img1.png" alt=""/><a href="nav.xhtml#toc">toc</a></body>
</html>
"#;

const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body><nav epub:type="toc" id="toc"><ol><li><a href="a.xhtml">A</a></li></ol></nav></body>
</html>
"#;

const CROSS_SALES: &str = r#"<html><body><img src="../Images/promo.png"/></body></html>"#;

const STYLE: &str = r#"@font-face { font-family: Body; src: url(../Fonts/font1.woff); }
/* .old { background: url(../Images/img2.png) } */
body { font-family: Body, serif; }
"#;

const UNUSED_STYLE: &str = r#"@font-face { font-family: Other; src: url("../Fonts/font2.woff"); }"#;

/// A PNG with enough texture that lossy passes change its size.
pub fn write_png(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let v = (x * 7 + y * 13 + (x * y) % 31) as u8;
        Rgb([v, v.wrapping_mul(3), 255 - v])
    });
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    img.save(path).unwrap();
}

pub fn write_jpeg(path: &Path, width: u32, height: u32, quality: u8) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 5 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&img)
        .unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, out).unwrap();
}

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Lay out the sample package under `root`.
pub fn write_book(root: &Path) {
    write(root, "mimetype", b"application/epub+zip");
    write(root, "META-INF/container.xml", CONTAINER.as_bytes());
    write(root, "OEBPS/content.opf", SAMPLE_OPF.as_bytes());
    write(root, "OEBPS/Text/a.xhtml", CHAPTER_A.as_bytes());
    write(root, "OEBPS/Text/nav.xhtml", NAV.as_bytes());
    write(root, "OEBPS/Text/Generic Cross Sales.xhtml", CROSS_SALES.as_bytes());
    write(root, "OEBPS/Styles/style.css", STYLE.as_bytes());
    write(root, "OEBPS/Styles/unused.css", UNUSED_STYLE.as_bytes());
    write(root, "OEBPS/Fonts/font1.woff", b"wOFF-font-one");
    write(root, "OEBPS/Fonts/font2.woff", b"wOFF-font-two");
    write(root, "OEBPS/toc.ncx", b"<ncx/>");
    write(root, "OEBPS/.DS_Store", b"junk");
    for name in ["img1", "img2", "img3", "promo", "logo"] {
        write_png(&root.join(format!("OEBPS/Images/{name}.png")), 16, 16);
    }
    write_jpeg(&root.join("OEBPS/Images/cover.jpg"), 32, 32, 90);
}
