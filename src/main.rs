fn main() {
    wviewer::run();
}
